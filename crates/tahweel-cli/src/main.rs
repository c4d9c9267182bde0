//! Tahweel command-line interface.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tahweel::{sweep_once, EngineCatalog, LocalArtifactStore, TahweelConfig};

#[derive(Parser)]
#[command(
    name = "tahweel",
    version,
    about = "Document conversion service: multi-engine orchestration with content-keyed caching"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Host address to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value_t = 8000)]
        port: u16,

        /// Path to a tahweel.toml config file (otherwise discovered)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Probe conversion engines and print their availability
    Check {
        /// Path to a tahweel.toml config file (otherwise discovered)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run one retention sweep over the configured stores
    Sweep {
        /// Path to a tahweel.toml config file (otherwise discovered)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<TahweelConfig> {
    match path {
        Some(path) => TahweelConfig::from_toml_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(TahweelConfig::discover()
            .context("config discovery failed")?
            .unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tahweel.toml");
        std::fs::write(&path, "max_upload_mb = 64\n").unwrap();

        let config = load_config(Some(path)).unwrap();
        assert_eq!(config.max_upload_mb, 64);
    }

    #[test]
    fn test_load_config_missing_explicit_path_fails() {
        let result = load_config(Some(PathBuf::from("/nonexistent/tahweel.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_serve_flags() {
        let cli = Cli::parse_from(["tahweel", "serve", "-H", "0.0.0.0", "-p", "9000"]);
        match cli.command {
            Commands::Serve { host, port, config } => {
                assert_eq!(host, "0.0.0.0");
                assert_eq!(port, 9000);
                assert!(config.is_none());
            }
            _ => panic!("expected serve command"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port, config } => {
            let config = load_config(config)?;
            match config.validate() {
                Ok(()) => {}
                Err(e) => anyhow::bail!("invalid configuration: {}", e),
            }
            tahweel::api::serve_with_config(&host, port, config)
                .await
                .context("server exited with an error")?;
        }

        Commands::Check { config } => {
            let config = load_config(config)?;
            let catalog = EngineCatalog::probe(&config.engines).await;
            let availability = catalog.availability();

            let report = serde_json::json!({
                "standard": availability.standard,
                "high_quality": availability.high_quality,
                "pdf_tools": catalog.pdf_tools_available(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !availability.any() {
                anyhow::bail!("no document conversion engine is available");
            }
        }

        Commands::Sweep { config } => {
            let config = load_config(config)?;
            let uploads = LocalArtifactStore::new(&config.upload_dir)
                .context("failed to open upload store")?;
            let outputs = LocalArtifactStore::new(&config.output_dir)
                .context("failed to open output store")?;

            let removed = sweep_once(
                &[
                    std::sync::Arc::new(uploads) as std::sync::Arc<dyn tahweel::ArtifactStore>,
                    std::sync::Arc::new(outputs),
                ],
                config.retention(),
            )
            .await;
            println!("removed {} expired file(s)", removed);
        }
    }

    Ok(())
}
