mod file_config;

pub use file_config::{FileConfig, RenderConfig, StreamConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub server_url: Option<String>,
    pub session_file: Option<PathBuf>,
    pub request_timeout_sec: u64,
    pub publish_threshold_chars: Option<usize>,
    pub render_citations: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub server_url: String,
    pub session_file: Option<PathBuf>,
    pub request_timeout_sec: u64,

    // Feature configs (with defaults)
    pub stream: StreamSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Publish a snapshot whenever the accumulated answer text crosses
    /// another multiple of this many characters. Lower values surface
    /// text sooner at the cost of more render passes.
    pub publish_threshold_chars: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            publish_threshold_chars: 20,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderSettings {
    pub citations: bool,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let server_url = file
            .server_url
            .or_else(|| cli.server_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("server_url must be specified via --server-url or in config file")
            })?;
        let server_url = server_url.trim_end_matches('/').to_string();
        if server_url.is_empty() {
            bail!("server_url must not be empty");
        }

        let session_file = file
            .session_file
            .map(PathBuf::from)
            .or_else(|| cli.session_file.clone());

        let request_timeout_sec = file.request_timeout_sec.unwrap_or(cli.request_timeout_sec);

        let stream_file = file.stream.unwrap_or_default();
        let publish_threshold_chars = stream_file
            .publish_threshold_chars
            .or(cli.publish_threshold_chars)
            .unwrap_or_else(|| StreamSettings::default().publish_threshold_chars);
        if publish_threshold_chars == 0 {
            bail!("publish_threshold_chars must be greater than zero");
        }

        let render_file = file.render.unwrap_or_default();
        let citations = render_file.citations.or(cli.render_citations).unwrap_or(false);

        Ok(Self {
            server_url,
            session_file,
            request_timeout_sec,
            stream: StreamSettings {
                publish_threshold_chars,
            },
            render: RenderSettings { citations },
        })
    }
}
