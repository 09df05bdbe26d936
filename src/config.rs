use anyhow::{ensure, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::recorder::{RecorderConfig, RedirectPolicy};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub recorder: RecorderSettings,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct RecorderSettings {
    /// Endpoint chunks are POSTed to
    pub upload_url: String,
    /// Where the user is sent after submitting
    pub next_url: String,
    pub chunk_duration_secs: u64,
    pub max_duration_secs: Option<u64>,
    pub file_extension: String,
    pub redirect_policy: RedirectPolicy,
    pub sample_rate: u32,
    pub channels: u16,
    /// Input device name (default device if unset)
    pub device: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub save_location: String,
    /// "sandbox" or "production"; uploads land in a subfolder of this name
    pub environment: String,
}

impl StorageConfig {
    pub fn root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.save_location).as_ref()).join(&self.environment)
    }
}

impl Config {
    /// Load from `path` (any format the config crate knows, extension optional)
    /// on top of built-in defaults. A missing file is not an error.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "speak-recorder")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 5000i64)?
            .set_default("recorder.upload_url", "http://127.0.0.1:5000/upload")?
            .set_default("recorder.next_url", "http://127.0.0.1:5000/health")?
            .set_default("recorder.chunk_duration_secs", 10i64)?
            .set_default("recorder.file_extension", "opus")?
            .set_default("recorder.redirect_policy", "always")?
            .set_default("recorder.sample_rate", 16000i64)?
            .set_default("recorder.channels", 1i64)?
            .set_default("storage.save_location", "~/.speak-recorder/user-content")?
            .set_default("storage.environment", "sandbox")?
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.recorder.chunk_duration_secs > 0,
            "recorder.chunk_duration_secs must be at least 1"
        );
        ensure!(
            self.recorder.max_duration_secs != Some(0),
            "recorder.max_duration_secs must be at least 1 when set"
        );
        ensure!(
            !self.recorder.file_extension.is_empty(),
            "recorder.file_extension must not be empty"
        );
        Ok(())
    }

    /// Controller settings derived from the `[recorder]` section
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            next_url: self.recorder.next_url.clone(),
            chunk_duration: Duration::from_secs(self.recorder.chunk_duration_secs),
            max_duration: self.recorder.max_duration_secs.map(Duration::from_secs),
            file_extension: self.recorder.file_extension.clone(),
            redirect_policy: self.recorder.redirect_policy,
            sample_rate: self.recorder.sample_rate,
            channels: self.recorder.channels,
            ..RecorderConfig::default()
        }
    }
}
