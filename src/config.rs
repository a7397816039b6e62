use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub upstream: UpstreamConfig,
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

/// Connection parameters for the streaming recognition service
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the live-listen endpoint
    pub url: String,

    /// API credential; resolved from `DEEPGRAM_API_KEY` when not set in the
    /// configuration file
    #[serde(default)]
    pub api_key: String,

    pub model: String,
    pub language: String,
    pub sample_rate: u32,
    pub channels: u16,

    /// Silence (ms) after which the service marks `speech_final`
    pub endpointing: u32,

    pub smart_format: bool,
    pub interim_results: bool,
    pub multichannel: bool,
}

impl Config {
    /// Load configuration from a file overlaid with `TRANSCRIBER_`-prefixed
    /// environment variables (`__` separates nested keys)
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("TRANSCRIBER").separator("__"))
            .build()?;

        let mut cfg: Config = settings.try_deserialize()?;

        if cfg.upstream.api_key.is_empty() {
            if let Ok(key) = std::env::var("DEEPGRAM_API_KEY") {
                cfg.upstream.api_key = key;
            }
        }

        Ok(cfg)
    }

    /// Fail fast when the upstream credential is missing
    pub fn require_api_key(&self) -> Result<()> {
        if self.upstream.api_key.is_empty() {
            anyhow::bail!("Missing Deepgram API key: set DEEPGRAM_API_KEY");
        }
        Ok(())
    }
}

impl UpstreamConfig {
    /// Full live-listen URL with query parameters
    pub fn listen_url(&self) -> String {
        format!(
            "{}?encoding=linear16&sample_rate={}&channels={}&multichannel={}&model={}&language={}&smart_format={}&interim_results={}&endpointing={}",
            self.url,
            self.sample_rate,
            self.channels,
            self.multichannel,
            self.model,
            self.language,
            self.smart_format,
            self.interim_results,
            self.endpointing,
        )
    }
}
