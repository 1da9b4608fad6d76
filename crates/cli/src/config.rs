//! Process-wide configuration.
//!
//! The file is a fedora-messaging `config.toml`: broker settings at the top
//! level and this consumer's settings under `[consumer_config.azure]` and
//! `[consumer_config.lisa]`. Keys fedora-messaging uses that this consumer
//! does not (`callback`, `publish_exchange`, ...) are ignored so one file can
//! serve both.
//!
//! Loaded once at startup; environment variables override file values.

use std::path::{Path, PathBuf};

use dispatch::{
    Architecture, AzureRegion, DispatchSettings, FedoraRelease, SubscriptionId, SupportedImages,
};
use lisa::LisaSettings;
use listener::{AmqpSettings, Binding, TlsSettings, DEFAULT_DATAGREPPER_URL};
use serde::Deserialize;
use thiserror::Error;

/// Where fedora-messaging looks for its configuration by default.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fedora-messaging/config.toml";

pub const ENV_SUBSCRIPTION_ID: &str = "FEDORA_CLOUD_TESTS_SUBSCRIPTION_ID";
pub const ENV_REGION: &str = "FEDORA_CLOUD_TESTS_REGION";
pub const ENV_PRIVATE_KEY: &str = "FEDORA_CLOUD_TESTS_PRIVATE_KEY";
pub const ENV_AMQP_URL: &str = "FEDORA_CLOUD_TESTS_AMQP_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A section this consumer cannot run without is absent.
    #[error("the consumer requires a [{0}] config section")]
    MissingSection(&'static str),

    #[error("configuration value '{key}' must not be empty")]
    Empty { key: &'static str },
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// OTLP gRPC endpoint for span export. Export is off when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

/// `[consumer_config.azure]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AzureConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub subscription_id: String,
    /// SSH private key for the test VMs; a key is generated per run when unset.
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    #[serde(default)]
    pub supported_releases: Option<Vec<FedoraRelease>>,
    #[serde(default)]
    pub supported_architectures: Option<Vec<Architecture>>,
    #[serde(default = "default_true")]
    pub custom_run_name: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default)]
    pub azure: Option<AzureConfig>,
    #[serde(default)]
    pub lisa: LisaSettings,
}

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_amqp_url")]
    pub amqp_url: String,
    #[serde(default = "default_datagrepper_url")]
    pub datagrepper_url: String,
    #[serde(default)]
    pub tls: Option<TlsSettings>,
    #[serde(default = "default_bindings")]
    pub bindings: Vec<Binding>,
    #[serde(default)]
    pub consumer_config: ConsumerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_region() -> String {
    "westus3".to_string()
}

fn default_true() -> bool {
    true
}

fn default_amqp_url() -> String {
    "amqp://localhost:5672/%2f".to_string()
}

fn default_datagrepper_url() -> String {
    DEFAULT_DATAGREPPER_URL.to_string()
}

fn default_bindings() -> Vec<Binding> {
    vec![Binding::default()]
}

impl Config {
    /// Reads `path` and applies environment overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or has mistyped values.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides file values with the `FEDORA_CLOUD_TESTS_*` variables that `lookup` returns.
    ///
    /// Setting an Azure variable creates the `azure` section if the file had none.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_AMQP_URL) {
            self.amqp_url = url;
        }

        let subscription = lookup(ENV_SUBSCRIPTION_ID);
        let region = lookup(ENV_REGION);
        let private_key = lookup(ENV_PRIVATE_KEY);
        if subscription.is_none() && region.is_none() && private_key.is_none() {
            return;
        }

        let azure = self.consumer_config.azure.get_or_insert_with(|| AzureConfig {
            region: default_region(),
            subscription_id: String::new(),
            private_key: None,
            supported_releases: None,
            supported_architectures: None,
            custom_run_name: true,
        });
        if let Some(subscription) = subscription {
            azure.subscription_id = subscription;
        }
        if let Some(region) = region {
            azure.region = region;
        }
        if let Some(key) = private_key {
            azure.private_key = Some(PathBuf::from(key));
        }
    }

    fn azure(&self) -> Result<&AzureConfig, ConfigError> {
        self.consumer_config
            .azure
            .as_ref()
            .ok_or(ConfigError::MissingSection("consumer_config.azure"))
    }

    /// Static settings for the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the `azure` section is absent or its region or
    /// subscription id is empty.
    pub fn dispatch_settings(&self) -> Result<DispatchSettings, ConfigError> {
        let azure = self.azure()?;
        let region = AzureRegion::new(azure.region.as_str())
            .ok_or(ConfigError::Empty { key: "consumer_config.azure.region" })?;
        let subscription_id = SubscriptionId::new(azure.subscription_id.as_str())
            .ok_or(ConfigError::Empty { key: "consumer_config.azure.subscription_id" })?;
        let private_key = azure
            .private_key
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .map(expand_home);
        Ok(DispatchSettings {
            region,
            subscription_id,
            private_key,
            custom_run_name: azure.custom_run_name,
        })
    }

    /// The allow-list, with configured overrides applied over the defaults.
    pub fn supported_images(&self) -> SupportedImages {
        let mut supported = SupportedImages::default();
        if let Some(azure) = &self.consumer_config.azure {
            if let Some(releases) = &azure.supported_releases {
                supported.releases = releases.clone();
            }
            if let Some(architectures) = &azure.supported_architectures {
                supported.architectures = architectures.clone();
            }
        }
        supported
    }

    /// LISA settings with `~` expanded in the log root. An empty `log_root`
    /// turns the per-image log directory off.
    pub fn lisa_settings(&self) -> LisaSettings {
        let mut settings = self.consumer_config.lisa.clone();
        settings.log_root = settings
            .log_root
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .map(expand_home);
        settings
    }

    pub fn amqp_settings(&self) -> AmqpSettings {
        AmqpSettings {
            url: self.amqp_url.clone(),
            bindings: self.bindings.clone(),
            tls: self.tls.clone(),
        }
    }
}

/// Expands a leading `~` to the home directory; other paths are returned as-is.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
