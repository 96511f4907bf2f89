//! `voxelwright init`: first-time setup.

use std::path::Path;

use voxelwright_config::BuildConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = BuildConfig::config_dir();

    println!("🧱 Voxelwright: First-Time Setup");
    println!("================================\n");

    let created = write_default_config(&config_dir)?;
    let config_path = config_dir.join("config.toml");
    if created {
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Adjust {} to taste", config_path.display());
        println!("   2. Run: voxelwright config validate");
        println!("   3. Run: voxelwright simulate demos/watchtower.toml\n");
    } else {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run init.\n");
    }

    Ok(())
}

/// Create `dir` and a default `config.toml` in it unless one exists.
/// Returns whether a file was written.
fn write_default_config(dir: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        println!("✅ Created config directory: {}", dir.display());
    } else {
        println!("  Config directory exists: {}", dir.display());
    }

    let config_path = dir.join("config.toml");
    if config_path.exists() {
        return Ok(false);
    }
    std::fs::write(&config_path, BuildConfig::default_toml())?;
    tracing::debug!(path = %config_path.display(), "Wrote default configuration");
    Ok(true)
}
