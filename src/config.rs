use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub ffmpeg: FfmpegConfig,
    /// Directory for the embedded post database
    pub data_dir: String,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root for committed content, sharded two hex levels by digest prefix
    pub content_root: String,
    /// Root for derived thumbnails, sharded like content
    pub thumbnail_root: String,
    /// Staging directory for in-flight uploads. Must share a filesystem with
    /// `content_root` so the final commit is a metadata-only rename.
    pub staging_dir: String,
}

#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    /// ffmpeg executable, resolved via PATH unless absolute
    pub path: String,
    /// Upper bound on a single frame-extraction run
    pub timeout_secs: u64,
}

impl FfmpegConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            content_root: "./content".to_string(),
            thumbnail_root: "./thumbnail".to_string(),
            staging_dir: "./tmp".to_string(),
        }
    }
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            path: "ffmpeg".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let content_root =
            std::env::var("CONTENT_ROOT").unwrap_or_else(|_| "./content".to_string());
        let thumbnail_root =
            std::env::var("THUMBNAIL_ROOT").unwrap_or_else(|_| "./thumbnail".to_string());
        let staging_dir = std::env::var("STAGING_DIR").unwrap_or_else(|_| "./tmp".to_string());
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let ffmpeg_path = std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string());
        let ffmpeg_timeout_secs = std::env::var("FFMPEG_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10 * 1024 * 1024); // 10MiB

        let config = Config {
            storage: StorageConfig {
                content_root,
                thumbnail_root,
                staging_dir,
            },
            ffmpeg: FfmpegConfig {
                path: ffmpeg_path,
                timeout_secs: ffmpeg_timeout_secs,
            },
            data_dir,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("CONTENT_ROOT", &self.storage.content_root),
            ("THUMBNAIL_ROOT", &self.storage.thumbnail_root),
            ("STAGING_DIR", &self.storage.staging_dir),
            ("DATA_DIR", &self.data_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{name} cannot be empty"
                )));
            }
        }

        if self.ffmpeg.path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "FFMPEG_PATH cannot be empty".to_string(),
            ));
        }

        if self.ffmpeg.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "FFMPEG_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
