use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_ENV: &str = "RESOURCE_VIEW_CONFIG";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    #[serde(alias = "timeout")]
    pub timeout_secs: u64,
    pub no_format: bool,
    pub node: ViewDefaults,
    pub pod: ViewDefaults,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ViewDefaults {
    pub types: Vec<String>,
    pub sort_by: Option<String>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            no_format: false,
            node: ViewDefaults::default(),
            pod: ViewDefaults::default(),
        }
    }
}

impl ViewDefaults {
    pub fn types_list(&self) -> Option<String> {
        (!self.types.is_empty()).then(|| self.types.join(","))
    }
}

impl ViewConfig {
    pub fn load() -> Result<Self> {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        let cwd = std::env::current_dir().context("failed to resolve working directory")?;
        match discover_config_path(std::env::var(CONFIG_ENV).ok(), &cwd, home.as_deref()) {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let parsed = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        };
        ensure!(
            (1..=MAX_TIMEOUT_SECS).contains(&parsed.timeout_secs),
            "timeout_secs in {} must be between 1 and {MAX_TIMEOUT_SECS}, got {}",
            path.display(),
            parsed.timeout_secs
        );
        debug!(path = %path.display(), "loaded config");
        Ok(parsed)
    }
}

/// A non-blank override is returned as is, even when the file does not exist.
fn discover_config_path(
    override_path: Option<String>,
    cwd: &Path,
    home: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = override_path
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        cwd.join("resource-view.yaml"),
        cwd.join(".resource-view.yaml"),
    ];
    let home_candidates = home
        .map(|home| home.join(".config/resource-view/config.yaml"))
        .into_iter();

    cwd_candidates
        .into_iter()
        .chain(home_candidates)
        .find(|candidate| candidate.exists())
}
