//! `filescout doctor`: Diagnose configuration and endpoint health.

use filescout_config::{AppConfig, SessionBackend};
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 FileScout Doctor: System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let file = super::config_file(config_path);
    if file.exists() {
        println!("  ✅ Config file found: {}", file.display());
    } else {
        println!("  ⚠️  No config file at {}, using defaults (run `filescout init`)", file.display());
    }

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else {
        println!("  ❌ No API key: set FILESCOUT_API_KEY or api_key in config.toml");
        issues += 1;
    }

    issues += check_tools(&config);
    issues += check_sessions(&config);

    if config.has_api_key() {
        match filescout_providers::provider_from_config(&config) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => println!("  ✅ Endpoint reachable: {}", config.api_base),
                Ok(false) => {
                    println!("  ❌ Endpoint rejected the request: {}", config.api_base);
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Endpoint check failed: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Provider setup failed: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ⏭️  Skipping endpoint check (no API key)");
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

fn check_tools(config: &AppConfig) -> u32 {
    let mut issues = 0;
    if let Some(dir) = &config.tools.base_dir {
        if dir.is_dir() {
            println!("  ✅ Base directory exists: {}", dir.display());
        } else {
            println!("  ❌ Base directory missing: {}", dir.display());
            issues += 1;
        }
    }
    for root in &config.tools.allowed_roots {
        if !root.is_dir() {
            println!("  ⚠️  Allowed root is not a directory: {}", root.display());
            issues += 1;
        }
    }
    issues
}

fn check_sessions(config: &AppConfig) -> u32 {
    match config.sessions.backend {
        SessionBackend::Memory => {
            println!("  ✅ Sessions kept in memory (not persisted)");
            0
        }
        SessionBackend::File => {
            let dir = config.sessions.resolved_dir();
            if dir.is_dir() {
                println!("  ✅ Session directory exists: {}", dir.display());
            } else {
                println!("  ⚠️  Session directory will be created on first save: {}", dir.display());
            }
            0
        }
    }
}
