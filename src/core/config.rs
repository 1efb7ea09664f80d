use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_MTGOX_URL: &str = "https://data.mtgox.com";
pub const DEFAULT_CNB_URL: &str = "http://www.cnb.cz";

/// Cache and derivation settings for the price oracle.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct OracleConfig {
    pub cache_path: PathBuf,
    pub validity_secs: u64,
    /// ISO code of the currency bridging the ticker and the fiat table
    pub intermediate_currency: String,
}

impl OracleConfig {
    pub fn validity(&self) -> Duration {
        Duration::from_secs(self.validity_secs)
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            cache_path: PathBuf::from("price_cache.dat"),
            validity_secs: 300,
            intermediate_currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MtGoxProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CnbProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProvidersConfig {
    pub mtgox: Option<MtGoxProviderConfig>,
    pub cnb: Option<CnbProviderConfig>,
}

impl ProvidersConfig {
    pub fn mtgox_url(&self) -> &str {
        self.mtgox
            .as_ref()
            .map_or(DEFAULT_MTGOX_URL, |p| &p.base_url)
    }

    pub fn cnb_url(&self) -> &str {
        self.cnb.as_ref().map_or(DEFAULT_CNB_URL, |p| &p.base_url)
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            mtgox: Some(MtGoxProviderConfig {
                base_url: DEFAULT_MTGOX_URL.to_string(),
            }),
            cnb: Some(CnbProviderConfig {
                base_url: DEFAULT_CNB_URL.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    /// Loads the config at the default location, falling back to built-in
    /// defaults when no file has been set up.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("cz", "bitcoin", "kurz")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
