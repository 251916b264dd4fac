//! Write a default trial config.

use std::path::PathBuf;

use clothstim_model::trial::TrialConfig;

pub fn run(path: PathBuf, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let config = TrialConfig::default();
    config
        .save(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write trial config: {e}"))?;

    println!("Trial config written to {}", path.display());
    println!("  Grid: {}x{}", config.grid_x, config.grid_y);
    println!(
        "  Size: {}-{} deg at {} px/deg",
        config.min_size_deg, config.max_size_deg, config.pixels_per_degree
    );
    println!("  ISI: {} ms ({})", config.isi_ms, config.isi_mode.as_str());
    println!("  FPS: {}", config.fps);

    Ok(())
}
