//! `veritas doctor` — Diagnose configuration health. Makes no network calls.

use std::path::Path;

use veritas_config::ConfigError;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Veritas Doctor — Configuration Diagnostics");
    println!("============================================\n");

    let mut issues = 0;
    let path = super::resolve_config_path(config_path);

    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file at {} — defaults and environment only", path.display());
    }

    match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            println!("     Search:    {}", config.search.api_url);
            println!("     Reasoning: {} ({})", config.reasoning.api_url, config.reasoning.model);
            println!("     Window:    {} turns", config.context.window_size);

            match config.require_secrets() {
                Ok(_) => println!("  ✅ Search and reasoning API keys configured"),
                Err(ConfigError::ConfigurationMissing(missing)) => {
                    for secret in missing {
                        println!(
                            "  ❌ Missing {} — set {}",
                            secret.config_key(),
                            secret.env_vars().join(" or ")
                        );
                        issues += 1;
                    }
                }
                Err(e) => {
                    println!("  ❌ {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
