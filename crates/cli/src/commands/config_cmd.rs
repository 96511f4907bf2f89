//! `voxelwright config`: configuration management commands.

use voxelwright_config::BuildConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match BuildConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Scan radius:  {}", config.tick_scan_radius);
            println!(
                "   Layers:       {}",
                if config.layering() {
                    format!(
                        "{} high, {}",
                        config.layers.height,
                        if config.layers.top_down { "top down" } else { "bottom up" }
                    )
                } else {
                    "off".to_string()
                }
            );
            println!(
                "   Repeat:       {} x {}",
                config.repeat.vector,
                if config.repeat.count < 0 {
                    "unlimited".to_string()
                } else {
                    config.repeat.count.to_string()
                }
            );
            println!("   Reach:        {}", config.planner.reach_distance);
            println!(
                "   Throwaway:    {}",
                config.inventory.throwaway_materials.join(", ")
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Settings that parse and validate but are probably not what was meant.
fn warnings(config: &BuildConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if !config.planner.allow_place && !config.planner.allow_break {
        warnings.push("Both allow_place and allow_break are off; nothing can be built");
    }

    if config.repeat.vector.is_zero() && config.repeat.count > 1 {
        warnings.push("repeat.count is set but repeat.vector is zero");
    }

    if !config.layering() && config.start_at_layer != 0 {
        warnings.push("start_at_layer has no effect while layers are disabled");
    }

    if config.skip_failed_layers && !config.layering() {
        warnings.push("skip_failed_layers has no effect while layers are disabled");
    }

    if f64::from(config.planner.nearby_radius) > config.planner.reach_distance + 1.0 {
        warnings.push("nearby_radius reaches well past reach_distance");
    }

    if config.inventory.throwaway_materials.is_empty() {
        warnings.push("No throwaway materials: scaffolding placements will be refused");
    }

    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = BuildConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = BuildConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = BuildConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn defaults_raise_no_warnings() {
        assert!(warnings(&BuildConfig::default()).is_empty());
    }

    #[test]
    fn suspicious_settings_are_flagged() {
        let mut config = BuildConfig::default();
        config.planner.allow_place = false;
        config.planner.allow_break = false;
        config.repeat.count = 3;
        config.start_at_layer = 2;
        let found = warnings(&config);
        assert_eq!(found.len(), 3);
        assert!(found.iter().any(|w| w.contains("nothing can be built")));
    }
}
