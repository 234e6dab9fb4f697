//=========================================================================
// Configuration
//=========================================================================
//
// TOML configuration for a scoreboard process. Every field has a default,
// so an empty file (or no file at all) yields a working local setup.
//
// Per-deployment differences such as matrix size and page sizes live here
// rather than in separate code paths.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

//=== Internal Dependencies ===============================================

use crate::core::bus::{Bus, LocalBus, MemoryStore, SnapshotStore};
use crate::core::patch::Tree;
use crate::core::scheduler::PageSizes;
use crate::core::store::default_template;
use crate::display::Backend;

//=== ConfigError =========================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("entity template {} is not a JSON object", .path.display())]
    Template { path: PathBuf },

    #[error("transport {0:?} is not available in this build")]
    TransportUnavailable(&'static str),

    #[error("cannot connect to {url}: {reason}")]
    Connect { url: String, reason: String },
}

//=== ScoreboardConfig ====================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreboardConfig {
    pub matrix: MatrixConfig,
    pub schedule: ScheduleConfig,
    pub bus: BusConfig,
    pub store: StoreConfig,
}

impl ScoreboardConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        info!(target: "engine", "Loaded configuration from {}", path.display());
        Ok(config)
    }
}

//--- [matrix] ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub width: u32,
    pub height: u32,
    pub backend: Backend,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            width: 384,
            height: 256,
            backend: Backend::Hardware,
        }
    }
}

//--- [schedule] ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub cycle_secs: u64,
    pub overview_page_size: usize,
    pub dual_page_size: usize,
    pub detailed_page_size: usize,
    pub gamecast_page_size: usize,
}

impl ScheduleConfig {
    pub fn cycle(&self) -> Duration {
        Duration::from_secs(self.cycle_secs.max(1))
    }

    pub fn page_sizes(&self) -> PageSizes {
        PageSizes {
            overview: self.overview_page_size,
            dual: self.dual_page_size,
            detailed: self.detailed_page_size,
            gamecast: self.gamecast_page_size,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let sizes = PageSizes::default();
        Self {
            cycle_secs: 10,
            overview_page_size: sizes.overview,
            dual_page_size: sizes.dual,
            detailed_page_size: sizes.detailed,
            gamecast_page_size: sizes.gamecast,
        }
    }
}

//--- [bus] ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// In-process bus and memory store; only useful inside one process.
    #[default]
    Local,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub transport: Transport,
    pub redis_url: String,
    pub receive_timeout_ms: u64,
    pub retry_ms: u64,
}

impl BusConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms.max(1))
    }

    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms.max(1))
    }

    /// Builds the configured bus and snapshot store.
    ///
    /// This is the only place a transport is constructed; a failure here
    /// is meant to end the process.
    pub fn connect(&self) -> Result<(Arc<dyn Bus>, Arc<dyn SnapshotStore>), ConfigError> {
        match self.transport {
            Transport::Local => {
                let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
                let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
                Ok((bus, store))
            }
            Transport::Redis => self.connect_redis(),
        }
    }

    #[cfg(feature = "redis")]
    fn connect_redis(&self) -> Result<(Arc<dyn Bus>, Arc<dyn SnapshotStore>), ConfigError> {
        use crate::core::bus::{RedisBus, RedisStore};

        let connect_error = |reason: String| ConfigError::Connect {
            url: self.redis_url.clone(),
            reason,
        };
        let bus = RedisBus::connect(&self.redis_url, self.retry()).map_err(|e| connect_error(e.to_string()))?;
        let store = RedisStore::connect(&self.redis_url).map_err(|e| connect_error(e.to_string()))?;
        info!(target: "bus", "Connected to {}", self.redis_url);

        let bus: Arc<dyn Bus> = Arc::new(bus);
        let store: Arc<dyn SnapshotStore> = Arc::new(store);
        Ok((bus, store))
    }

    #[cfg(not(feature = "redis"))]
    fn connect_redis(&self) -> Result<(Arc<dyn Bus>, Arc<dyn SnapshotStore>), ConfigError> {
        Err(ConfigError::TransportUnavailable("redis"))
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Local,
            redis_url: "redis://127.0.0.1:6379/0".into(),
            receive_timeout_ms: 5000,
            retry_ms: 1000,
        }
    }
}

//--- [store] -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Fixed number of game slots.
    pub capacity: usize,

    /// JSON file holding the tree every slot starts from. Falls back to the
    /// built-in baseball skeleton.
    pub template: Option<PathBuf>,
}

impl StoreConfig {
    pub fn template(&self) -> Result<Tree, ConfigError> {
        let Some(path) = &self.template else {
            return Ok(default_template());
        };

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(serde_json::Value::Object(tree)) => Ok(tree),
            _ => Err(ConfigError::Template { path: path.clone() }),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            template: None,
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
