use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::timestamp::TimeEncoding;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub tagger: Option<TaggerConfig>,
    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_daily_fallback_limit")]
    pub daily_fallback_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            daily_fallback_limit: default_daily_fallback_limit(),
        }
    }
}

/// A century; keeps `now - lookback` well inside chrono's range.
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

fn default_lookback_days() -> u32 {
    7
}
fn default_daily_fallback_limit() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub obsidian_vault: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            obsidian_vault: None,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("~/browser-summaries")
}

impl OutputConfig {
    pub fn daily_dir(&self) -> PathBuf {
        expand_home(&self.dir).join("daily")
    }

    pub fn weekly_dir(&self) -> PathBuf {
        expand_home(&self.dir).join("weekly")
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub brave: SourceConfig,
    #[serde(default)]
    pub chrome: SourceConfig,
    #[serde(default)]
    pub safari: SourceConfig,
    #[serde(default)]
    pub firefox: FirefoxSourceConfig,
}

/// Per-browser overrides. Everything is optional; defaults come from the
/// platform's standard profile locations.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub encoding: Option<TimeEncoding>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            encoding: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FirefoxSourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Explicit `places.sqlite`; skips profile discovery.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub encoding: Option<TimeEncoding>,
    #[serde(default)]
    pub profiles_dir: Option<PathBuf>,
    #[serde(default = "default_profile_glob")]
    pub profile_glob: String,
}

impl Default for FirefoxSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            encoding: None,
            profiles_dir: None,
            profile_glob: default_profile_glob(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_profile_glob() -> String {
    "*.default*".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClassifierConfig {
    /// Use only the configured topics instead of extending the built-ins.
    #[serde(default)]
    pub replace_topics: bool,
    #[serde(default)]
    pub replace_tags: bool,
    #[serde(default)]
    pub topics: Vec<CategoryConfig>,
    #[serde(default)]
    pub tags: Vec<CategoryConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TaggerConfig {
    pub script: PathBuf,
    #[serde(default = "default_tagger_timeout")]
    pub timeout_secs: u64,
}

fn default_tagger_timeout() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_service_label")]
    pub label: String,
    #[serde(default = "default_service_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    #[serde(default = "default_service_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            label: default_service_label(),
            hour: default_service_hour(),
            minute: 0,
            log_dir: default_service_log_dir(),
        }
    }
}

fn default_service_label() -> String {
    "com.hdigest.agent".to_string()
}
fn default_service_hour() -> u32 {
    3
}
fn default_service_log_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.history.lookback_days == 0 {
        bail!("history.lookback_days must be >= 1");
    }
    if config.history.lookback_days > MAX_LOOKBACK_DAYS {
        bail!("history.lookback_days must be <= {}", MAX_LOOKBACK_DAYS);
    }

    for (section, categories) in [
        ("classifier.topics", &config.classifier.topics),
        ("classifier.tags", &config.classifier.tags),
    ] {
        for category in categories {
            if category.name.trim().is_empty() {
                bail!("{} entries must have a non-empty name", section);
            }
            if category.keywords.iter().any(|k| k.trim().is_empty()) {
                bail!("{}.{} contains an empty keyword", section, category.name);
            }
        }
    }

    if config.service.hour > 23 {
        bail!("service.hour must be in [0, 23]");
    }
    if config.service.minute > 59 {
        bail!("service.minute must be in [0, 59]");
    }

    if let Some(tagger) = &config.tagger {
        if tagger.timeout_secs == 0 {
            bail!("tagger.timeout_secs must be > 0");
        }
    }

    Ok(())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
