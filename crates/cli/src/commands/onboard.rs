//! `veritas onboard` — First-time setup.

use std::path::Path;

use veritas_config::{AppConfig, REASONING_KEY_ENV, SEARCH_KEY_ENV};

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = super::resolve_config_path(config_path);

    println!("🔎 Veritas — First-Time Setup");
    println!("=============================\n");

    if let Some(dir) = config_path.parent()
        && !dir.as_os_str().is_empty()
    {
        if dir.exists() {
            println!("  Config directory exists: {}", dir.display());
        } else {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!(
        "   1. Export {} (web search) and {} (reasoning),",
        SEARCH_KEY_ENV[1], REASONING_KEY_ENV[1]
    );
    println!("      or add api_key under [search] and [reasoning] in the config");
    println!("   2. Run: veritas doctor");
    println!("   3. Run: veritas chat   (or `veritas serve` for the web UI)\n");

    Ok(())
}
