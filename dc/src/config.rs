//! Configuration
//!
//! YAML config with kebab-case keys. Load order: explicit `--config` path,
//! then `.duncall.yml` in the working directory, then
//! `~/.config/duncall/duncall.yml`, then built-in defaults. Every section is
//! optional; a partial file only overrides what it names.

use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

const LOCAL_CONFIG: &str = ".duncall.yml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub telephony: TelephonyConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Log level; overridden by --log-level on the command line
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LlmConfig {
    /// Classifier provider; "groq" is the only built-in
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key (never the key itself)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TelephonyConfig {
    /// "simulated" is the only built-in transport
    #[serde(default = "default_telephony_mode")]
    pub mode: String,
    /// Fixed simulated scenario (paid, will-pay, needs-extension, dispute,
    /// no-response); unset means randomly drawn per call
    #[serde(default)]
    pub scenario: Option<String>,
    /// Injected failure fraction for the simulated transport
    #[serde(default)]
    pub failure_rate: f64,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            mode: default_telephony_mode(),
            scenario: None,
            failure_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DispatchConfig {
    /// Concurrent call attempts per batch
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    /// Placement tries per borrower before the attempt fails
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Per-placement timeout
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            max_attempts: default_max_attempts(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite database path; defaults to the XDG data directory
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.groq.com/openai".to_string()
}

fn default_telephony_mode() -> String {
    "simulated".to_string()
}

fn default_max_parallel() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_call_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration, walking the fallback chain
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            debug!("load: explicit config {}", path.display());
            return Self::from_file(path);
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            debug!("load: local config {}", local.display());
            return Self::from_file(local);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg = config_dir.join("duncall").join("duncall.yml");
            if xdg.exists() {
                debug!("load: user config {}", xdg.display());
                return Self::from_file(&xdg);
            }
        }

        debug!("load: no config file found, using defaults");
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .wrap_err_with(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.llm.provider != "groq" {
            bail!("unknown llm provider {:?} (only \"groq\" is supported)", self.llm.provider);
        }
        if self.telephony.mode != "simulated" {
            bail!(
                "unknown telephony mode {:?} (only \"simulated\" is supported)",
                self.telephony.mode
            );
        }
        if !(0.0..=1.0).contains(&self.telephony.failure_rate) {
            bail!("telephony failure-rate must be between 0.0 and 1.0");
        }
        Ok(())
    }

    /// Read the classifier API key from the configured environment variable.
    /// Checked only when a command actually needs the classifier.
    pub fn resolve_api_key(&self) -> Result<String> {
        std::env::var(&self.llm.api_key_env).wrap_err_with(|| {
            format!(
                "environment variable {} is not set (required for the {} classifier)",
                self.llm.api_key_env, self.llm.provider
            )
        })
    }

    /// Database path: configured value or the XDG data directory
    pub fn db_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.storage.db_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir().ok_or_else(|| eyre::eyre!("no data directory found"))?;
        Ok(data_dir.join("duncall").join("duncall.db"))
    }
}
