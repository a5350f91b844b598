use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "fixdex";

const DEFAULT_IMAGE_ROOT: &str = "images";
const DEFAULT_PLACEHOLDER: &str = "images/placeholder.png";
const DEFAULT_PROBE_LIMIT: usize = 8;

/// Which persistence backend holds the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// JSON files under the data dir.
    Local,
    /// Remote document store over HTTP.
    Remote,
}

impl Backend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Backend::Local),
            "remote" => Some(Backend::Remote),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub backend: Backend,
    pub data_dir: PathBuf,
    /// Base URL of the remote document store; required when backend = "remote".
    pub remote_url: Option<String>,
    pub image: ImageConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Root every candidate URL is generated under: an http(s) base URL or a
    /// local directory.
    pub root: String,
    /// Static fallback bound when every candidate fails.
    pub placeholder: String,
    /// Maximum confirmed hits collected per probe run.
    pub probe_limit: usize,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Pin resolved matching to the identity fields (brand/model/errorCode)
    /// when one of them is the selected field.
    pub identity_override: bool,
}

// Raw mirror of the TOML file; every setting optional so a missing file or a
// partial file both work.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    backend: Option<String>,
    data_dir: Option<PathBuf>,
    remote_url: Option<String>,
    #[serde(default)]
    image: RawImage,
    #[serde(default)]
    search: RawSearch,
}

#[derive(Debug, Default, Deserialize)]
struct RawImage {
    root: Option<String>,
    placeholder: Option<String>,
    probe_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSearch {
    identity_override: Option<bool>,
}

/// Load configuration from an explicit path or the platform default
/// location. A missing file yields the defaults; a present file is parsed
/// and validated.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let config_path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    let raw = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read config at {}", config_path.display()))?;
        toml::from_str::<RawConfig>(&content)
            .with_context(|| format!("failed to parse config at {}", config_path.display()))?
    } else if explicit.is_some() {
        bail!("config file does not exist: {}", config_path.display());
    } else {
        RawConfig::default()
    };

    let backend = match raw.backend.as_deref() {
        Some(name) => Backend::from_str(name)
            .with_context(|| format!("unknown backend \"{name}\" (expected \"local\" or \"remote\")"))?,
        None => Backend::Local,
    };

    let data_dir = match raw.data_dir {
        Some(dir) => expand_tilde(&dir),
        None => default_data_dir()?,
    };

    let config = Config {
        config_path,
        backend,
        data_dir,
        remote_url: raw.remote_url,
        image: ImageConfig {
            root: raw.image.root.unwrap_or_else(|| DEFAULT_IMAGE_ROOT.to_string()),
            placeholder: raw
                .image
                .placeholder
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string()),
            probe_limit: raw.image.probe_limit.unwrap_or(DEFAULT_PROBE_LIMIT),
        },
        search: SearchConfig {
            identity_override: raw.search.identity_override.unwrap_or(true),
        },
    };

    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<()> {
        if self.backend == Backend::Remote && self.remote_url.is_none() {
            bail!("remote_url is required when backend = \"remote\"");
        }
        if self.image.root.trim().is_empty() {
            bail!("image.root must not be empty");
        }
        if self.image.probe_limit == 0 {
            bail!("image.probe_limit must be at least 1");
        }
        Ok(())
    }
}

fn default_config_path() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine config directory")?;
    Ok(base.config_dir().join(APP_NAME).join(CONFIG_FILE_NAME))
}

fn default_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine data directories")?;
    Ok(base.data_dir().join(APP_NAME))
}

/// Expand ~ to the home directory in paths.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
