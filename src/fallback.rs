//! First-visible-image fallback.
//!
//! The prober collects up to N confirmed hits; a display slot wants the
//! first reference that loads, right now. [`ImageSlot`] walks the same
//! candidate ordering one attempt at a time: a load failure advances to the
//! next candidate, exhaustion pins the static placeholder permanently, and a
//! success settles the slot. The event-driven shape guarantees at most one
//! in-flight attempt per slot.

use crate::probe::ImageLoader;

#[derive(Debug)]
pub struct ImageSlot {
    candidates: Vec<String>,
    placeholder: String,
    next: usize,
    confirmed: bool,
}

impl ImageSlot {
    pub fn new(candidates: Vec<String>, placeholder: impl Into<String>) -> Self {
        Self {
            candidates,
            placeholder: placeholder.into(),
            next: 0,
            confirmed: false,
        }
    }

    /// The reference currently bound to the slot: the candidate under
    /// attempt, the confirmed candidate, or the placeholder.
    pub fn src(&self) -> &str {
        if self.next < self.candidates.len() {
            &self.candidates[self.next]
        } else {
            &self.placeholder
        }
    }

    /// True once the slot will not change again: a candidate loaded, or the
    /// placeholder is bound.
    pub fn settled(&self) -> bool {
        self.confirmed || self.next >= self.candidates.len()
    }

    pub fn is_placeholder(&self) -> bool {
        !self.confirmed && self.next >= self.candidates.len()
    }

    /// The currently bound candidate loaded; pin it.
    pub fn on_load_ok(&mut self) {
        if self.next < self.candidates.len() {
            self.confirmed = true;
        }
    }

    /// The currently bound candidate failed to load; advance. Past the last
    /// candidate the placeholder stays bound and further failures are
    /// ignored (no retries).
    pub fn on_load_error(&mut self) -> &str {
        if !self.settled() {
            self.next += 1;
        }
        self.src()
    }

    /// Drive the slot to its final binding with the given loader.
    pub async fn resolve(mut self, loader: &dyn ImageLoader) -> String {
        while !self.settled() {
            match loader.load(self.src()).await {
                Ok(()) => self.on_load_ok(),
                Err(_) => {
                    self.on_load_error();
                }
            }
        }
        self.src().to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;
    use crate::probe::LoadFailure;

    struct FixedLoader {
        available: HashSet<String>,
    }

    #[async_trait]
    impl ImageLoader for FixedLoader {
        async fn load(&self, url: &str) -> Result<(), LoadFailure> {
            if self.available.contains(url) {
                Ok(())
            } else {
                Err(LoadFailure::Fetch("missing".into()))
            }
        }
    }

    fn slot(candidates: &[&str]) -> ImageSlot {
        ImageSlot::new(
            candidates.iter().map(|s| s.to_string()).collect(),
            "placeholder.png",
        )
    }

    #[test]
    fn failures_cascade_then_pin_placeholder() {
        let mut slot = slot(&["a.jpg", "b.jpg"]);
        assert_eq!(slot.src(), "a.jpg");
        assert_eq!(slot.on_load_error(), "b.jpg");
        assert_eq!(slot.on_load_error(), "placeholder.png");
        assert!(slot.settled());
        assert!(slot.is_placeholder());
        // No retries once the placeholder is bound.
        assert_eq!(slot.on_load_error(), "placeholder.png");
    }

    #[test]
    fn success_settles_and_ignores_later_errors() {
        let mut slot = slot(&["a.jpg", "b.jpg"]);
        slot.on_load_ok();
        assert!(slot.settled());
        assert!(!slot.is_placeholder());
        assert_eq!(slot.on_load_error(), "a.jpg");
    }

    #[test]
    fn empty_candidate_list_binds_placeholder_immediately() {
        let slot = slot(&[]);
        assert_eq!(slot.src(), "placeholder.png");
        assert!(slot.settled());
        assert!(slot.is_placeholder());
    }

    #[tokio::test]
    async fn resolve_returns_first_loadable_candidate() {
        let loader = FixedLoader {
            available: ["b.jpg".to_string()].into_iter().collect(),
        };
        let resolved = slot(&["a.jpg", "b.jpg", "c.jpg"]).resolve(&loader).await;
        assert_eq!(resolved, "b.jpg");
    }

    #[tokio::test]
    async fn resolve_falls_back_to_placeholder() {
        let loader = FixedLoader {
            available: HashSet::new(),
        };
        let resolved = slot(&["a.jpg", "b.jpg"]).resolve(&loader).await;
        assert_eq!(resolved, "placeholder.png");
    }
}
