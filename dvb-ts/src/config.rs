//! Demultiplexer settings.
//!
//! Settings are read from a TOML file; every key is optional:
//!
//! ```toml
//! queue_len = 64
//! check_crc = true
//! section_max_len = 1024
//! max_sync_retries = 1000
//! pids = [0, 16, 17]
//! ```

use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::psi::section::{SECTION_BUF_MIN, SECTION_MAX_LEN};
use crate::ts::ANY_PID;

/// Settings of the packet pump and the section decoders fed by it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemuxConfig {
    /// Packet buffers circulating between the pump and its consumer.
    pub queue_len: usize,
    /// Verify CRC_32 of decoded sections.
    pub check_crc: bool,
    /// Section buffer size; 1024 for standard tables, 4096 for private ones.
    pub section_max_len: usize,
    /// Consecutive synchronization failures tolerated before the pump gives
    /// up.
    pub max_sync_retries: u32,
    /// PIDs passed by the pump. Empty, or containing 8192, passes all.
    pub pids: Vec<u16>,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            queue_len: 64,
            check_crc: true,
            section_max_len: 1024,
            max_sync_retries: 1000,
            pids: Vec::new(),
        }
    }
}

impl DemuxConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: DemuxConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        debug!("[DemuxConfig] Loaded config from: {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_len == 0 {
            return Err(ConfigError::Invalid {
                field: "queue_len",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(SECTION_BUF_MIN..=SECTION_MAX_LEN).contains(&self.section_max_len) {
            return Err(ConfigError::Invalid {
                field: "section_max_len",
                reason: format!(
                    "{} is outside {}..={}",
                    self.section_max_len, SECTION_BUF_MIN, SECTION_MAX_LEN
                ),
            });
        }
        if let Some(pid) = self.pids.iter().find(|&&p| p > ANY_PID) {
            return Err(ConfigError::Invalid {
                field: "pids",
                reason: format!("PID {} is greater than {}", pid, ANY_PID),
            });
        }
        Ok(())
    }

    /// True if the PID list lets every packet through.
    pub fn passes_all(&self) -> bool {
        self.pids.is_empty() || self.pids.contains(&ANY_PID)
    }
}
