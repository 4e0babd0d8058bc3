use thiserror::Error;

/// Tunables for one mount. Defaults match the reference layout exactly; a
/// host may shrink or grow them as long as [`MountConfig::validate`] passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct MountConfig {
    pub block_size: usize,
    pub max_blocks: usize,
    pub max_open_files: usize,
    pub max_name: usize,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            block_size: 16_384,
            max_blocks: 65_536,
            max_open_files: 1_000,
            max_name: 256,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid mount configuration: {0}")]
    Invalid(&'static str),
    #[cfg(feature = "config-file")]
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[cfg(feature = "config-file")]
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

impl MountConfig {
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::Invalid("block_size must be non-zero"));
        }
        if self.max_blocks == 0 {
            return Err(ConfigError::Invalid("max_blocks must be non-zero"));
        }
        if self.max_open_files == 0 {
            return Err(ConfigError::Invalid("max_open_files must be non-zero"));
        }
        if self.max_name < 2 {
            return Err(ConfigError::Invalid("max_name must allow at least a 1-byte name plus NUL"));
        }
        self.block_size
            .checked_mul(self.max_blocks)
            .ok_or(ConfigError::Invalid("max_blocks * block_size overflows usize"))?;
        Ok(())
    }

    pub fn max_size(&self) -> u64 {
        self.block_size as u64 * self.max_blocks as u64
    }

    #[cfg(feature = "config-file")]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> core::result::Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let cfg: MountConfig = toml::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }
}
