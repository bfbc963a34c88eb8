//! Subcommand implementations and the setup they share.

pub mod chat;
pub mod doctor;
pub mod onboard;
pub mod serve;

use std::path::{Path, PathBuf};

use veritas_agent::TurnOrchestrator;
use veritas_config::{AppConfig, ConfigError};

/// Resolve the config file: `--config` / `VERITAS_CONFIG`, else `~/.veritas/config.toml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path)
}

/// Load the config file and apply environment overrides.
///
/// An explicitly named file must exist; the default location may be absent.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    if let Some(path) = explicit
        && !path.exists()
    {
        return Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: "file not found".into(),
        });
    }
    AppConfig::load_with_env(&resolve_config_path(explicit))
}

/// Check secrets and wire the providers. Nothing is sent to either service
/// unless both keys are present.
pub fn build_orchestrator(
    config: &AppConfig,
) -> Result<TurnOrchestrator, Box<dyn std::error::Error>> {
    let secrets = match config.require_secrets() {
        Ok(secrets) => secrets,
        Err(e) => {
            report_missing(&e);
            return Err(Box::new(e));
        }
    };

    let providers = veritas_providers::build_from_config(config, &secrets)?;
    tracing::info!(?providers, model = %config.reasoning.model, "Providers ready");
    Ok(TurnOrchestrator::from_config(config, providers))
}

fn report_missing(err: &ConfigError) {
    let ConfigError::ConfigurationMissing(missing) = err else {
        return;
    };

    eprintln!("❌ Veritas cannot start: required API keys are not configured.\n");
    for secret in missing {
        eprintln!(
            "   • {}  (set {} or add it to config.toml)",
            secret.config_key(),
            secret.env_vars().join(" or ")
        );
    }
    eprintln!("\n   Run `veritas onboard` to create a config file.");
}
