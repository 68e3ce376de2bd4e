//! `filescout init`: Write a default configuration file.

use filescout_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = super::config_file(config_path);

    println!("🔎 FileScout: First-Time Setup");
    println!("===============================\n");

    if let Some(config_dir) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir)?;
            println!("✅ Created config directory: {}", config_dir.display());
        } else {
            println!("  Config directory exists: {}", config_dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run init.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Export FILESCOUT_API_KEY (or OPENAI_API_KEY), or set api_key in the file");
    println!("   2. Optionally point api_base at any OpenAI-compatible endpoint");
    println!("   3. Run: filescout doctor");
    println!("   4. Run: filescout chat\n");

    Ok(())
}
