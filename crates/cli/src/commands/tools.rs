//! `filescout tools`: List the tools the assistant can call.

use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let registry = filescout_tools::default_registry(&config.tools);

    println!("🔧 FileScout Tools ({})", registry.len());
    println!("====================\n");

    for tool in registry.list() {
        println!("  {}", tool.name());
        println!("    {}", tool.description());
        let schema = serde_json::to_string_pretty(&tool.parameters_schema())?;
        for line in schema.lines() {
            println!("      {line}");
        }
        println!();
    }

    match &config.tools.base_dir {
        Some(dir) => println!("  Relative paths resolve against: {}", dir.display()),
        None => println!("  Relative paths resolve against the current directory"),
    }
    if !config.tools.allowed_roots.is_empty() {
        println!("  Access limited to:");
        for root in &config.tools.allowed_roots {
            println!("    {}", root.display());
        }
    }

    Ok(())
}
