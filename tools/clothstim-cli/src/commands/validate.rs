//! Validate trajectory data and a trial config.

use std::path::PathBuf;

use clothstim_common::config::AppConfig;
use clothstim_core::scheduler::ScheduleConfig;
use clothstim_core::size::SizeBounds;
use clothstim_model::trajectory::load_cloth;

pub fn run(app: &AppConfig, trajectories: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Validating trajectories at: {}", trajectories.display());

    let cloth = load_cloth(&trajectories)
        .map_err(|e| anyhow::anyhow!("Failed to load trajectories: {e}"))?;
    let trial = super::load_trial_config(config.as_deref())?;

    println!("  Dots: {}", cloth.len());
    println!(
        "  Frames: {} (first frame {})",
        cloth.frame_count(),
        cloth.first_frame()
    );
    if let Some(bounds) = cloth.bounds_at(0) {
        println!(
            "  Extent at frame 0: {:.1} x {:.1} px",
            bounds.width(),
            bounds.height()
        );
    }

    let mut issues = Vec::new();
    if let Err(e) = trial.validate() {
        issues.push(e.to_string());
    }
    if cloth.is_empty() {
        issues.push("trajectory data contains no dots".to_string());
    }

    let schedule = ScheduleConfig::derive(&trial, cloth.frame_count());
    println!(
        "  Planned duration: {:.3}s ({} displayed frames)",
        schedule.duration_secs, schedule.total_frames
    );
    println!(
        "  Refresh ticks at {} Hz: ~{}",
        app.display.refresh_hz,
        (schedule.duration_secs * app.display.refresh_hz).ceil()
    );

    if trial.size_variation.is_enabled() {
        let diagonal = cloth.bounds_at(0).map(|b| b.diagonal()).unwrap_or(0.0);
        match SizeBounds::from_angular(
            diagonal,
            trial.min_size_deg,
            trial.max_size_deg,
            trial.pixels_per_degree,
        ) {
            Some(bounds) => println!(
                "  Scale range (full cloth): {:.3} .. {:.3}",
                bounds.min_scale, bounds.max_scale
            ),
            None => issues.push("cloth has no extent; size variation would be disabled".into()),
        }
    }

    if issues.is_empty() {
        println!("\nInputs are valid.");
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        println!("\n{} issue(s) found.", issues.len());
    }

    Ok(())
}
