//! Photo filename heuristics.
//!
//! Most records carry no explicit image references; likely file names are
//! derived from their text fields instead, in priority order, and expanded
//! into candidate URLs under the configured image root. Candidate lists are
//! ephemeral: generated fresh per request, never stored back unless a probe
//! confirms them and the caller writes them into `images` explicitly.

use std::collections::HashSet;

use deunicode::deunicode;

use crate::model::{ErrorEntry, StockEntry};

/// Extensions probed for every base, in priority order.
pub const EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".webp"];

/// Numbered-photo suffixes tried right after each base.
const SUFFIX_VARIANTS: [&str; 2] = ["_1", "_2"];

/// Normalize free text into a file-name token: transliterate to ASCII,
/// trim, lowercase, collapse whitespace runs to a single underscore, then
/// strip everything that is not alphanumeric, underscore, hyphen, or dot.
/// Total over all inputs and idempotent.
pub fn normalize(text: &str) -> String {
    let ascii = deunicode(text.trim());
    let lower = ascii.to_lowercase();

    let mut token = String::with_capacity(lower.len());
    let mut pending_gap = false;
    for ch in lower.chars() {
        if ch.is_whitespace() {
            pending_gap = true;
            continue;
        }
        if pending_gap {
            token.push('_');
            pending_gap = false;
        }
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.') {
            token.push(ch);
        }
    }
    token
}

/// Candidate bases for an error entry: model first, brand+model joins when
/// both fields are present, error code last.
pub fn error_bases(entry: &ErrorEntry) -> Vec<String> {
    let brand = normalize(&entry.brand);
    let model = normalize(&entry.model);
    let code = normalize(&entry.error_code);

    let mut priority = Vec::new();
    push_token(&mut priority, model.clone());
    if !brand.is_empty() && !model.is_empty() {
        priority.push(format!("{brand}_{model}"));
        priority.push(format!("{brand}-{model}"));
    }
    push_token(&mut priority, code);

    with_variants(priority)
}

/// Candidate bases for a stock entry: part name first, then part+model
/// joins, then brand+part joins.
pub fn stock_bases(entry: &StockEntry) -> Vec<String> {
    let part = normalize(&entry.part_name);
    let model = normalize(&entry.for_model);
    let brand = normalize(&entry.part_brand);

    let mut priority = Vec::new();
    push_token(&mut priority, part.clone());
    if !part.is_empty() && !model.is_empty() {
        priority.push(format!("{part}_{model}"));
        priority.push(format!("{part}-{model}"));
    }
    if !part.is_empty() && !brand.is_empty() {
        priority.push(format!("{brand}_{part}"));
        priority.push(format!("{brand}-{part}"));
    }

    with_variants(priority)
}

/// Expand bases into full candidate URLs under the image root, base-major,
/// extension-minor. Earlier candidates are always attempted first, so this
/// ordering is the tie-break between competing matches.
pub fn candidate_urls(root: &str, bases: &[String]) -> Vec<String> {
    let root = root.trim_end_matches('/');
    let mut urls = Vec::with_capacity(bases.len() * EXTENSIONS.len());
    for base in bases {
        for ext in EXTENSIONS {
            urls.push(format!("{root}/{base}{ext}"));
        }
    }
    urls
}

fn push_token(out: &mut Vec<String>, token: String) {
    if !token.is_empty() {
        out.push(token);
    }
}

/// Expand each base into itself plus its numbered variants, then drop
/// repeats keeping first-seen order.
fn with_variants(bases: Vec<String>) -> Vec<String> {
    let mut expanded = Vec::with_capacity(bases.len() * (1 + SUFFIX_VARIANTS.len()));
    for base in bases {
        expanded.push(base.clone());
        for suffix in SUFFIX_VARIANTS {
            expanded.push(format!("{base}{suffix}"));
        }
    }

    let mut seen = HashSet::new();
    expanded
        .into_iter()
        .filter(|token| seen.insert(token.clone()))
        .collect()
}
