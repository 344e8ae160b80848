//! Runtime configuration: logging and oracle selection.
//!
//! Precedence for every setting is flag → environment → default. The store
//! path is handled by clap (`--db` / `UIDMATRIX_DB`); oracle settings are
//! resolved by `uidmatrix_intent::OracleConfig`.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use uidmatrix_intent::{Backend, ConfigOverrides, OracleConfig};

pub const DB_ENV: &str = "UIDMATRIX_DB";

/// Install the stderr subscriber. `RUST_LOG` wins over `-v`.
pub fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // stdout carries results only.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Oracle flags shared by commands that classify text.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct OracleArgs {
    /// LLM backend: anthropic, openai, ollama or offline [env: UIDMATRIX_LLM_BACKEND]
    #[arg(long, value_parser = parse_backend)]
    pub backend: Option<Backend>,
    /// Model name [env: UIDMATRIX_LLM_MODEL]
    #[arg(long)]
    pub model: Option<String>,
    /// Oracle timeout in seconds, at least 1 [env: UIDMATRIX_LLM_TIMEOUT_SECS]
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

fn parse_backend(s: &str) -> Result<Backend, String> {
    s.parse().map_err(|e: uidmatrix_intent::ConfigError| e.to_string())
}

impl OracleArgs {
    pub fn resolve(&self) -> Result<OracleConfig> {
        let overrides = ConfigOverrides {
            backend: self.backend,
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
        };
        OracleConfig::from_env(&overrides).context("invalid oracle configuration")
    }
}
