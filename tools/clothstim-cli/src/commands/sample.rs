//! Preview which dots the grid sampler selects.

use std::path::PathBuf;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use clothstim_core::sampler::GridSampler;
use clothstim_model::trajectory::load_cloth;

pub fn run(
    trajectories: PathBuf,
    config: Option<PathBuf>,
    grid_x: Option<u32>,
    grid_y: Option<u32>,
    seed: u64,
) -> anyhow::Result<()> {
    let cloth = load_cloth(&trajectories)
        .map_err(|e| anyhow::anyhow!("Failed to load trajectories: {e}"))?;
    let mut trial = super::load_trial_config(config.as_deref())?;
    trial.grid_x = grid_x.unwrap_or(trial.grid_x);
    trial.grid_y = grid_y.unwrap_or(trial.grid_y);

    let sampler = GridSampler::from_config(&trial);
    let mut rng = SmallRng::seed_from_u64(seed);
    let selection = sampler.sample(&cloth, 0, &mut rng);

    println!(
        "Grid {}x{} (jitter {}) over {} dots",
        sampler.grid_x,
        sampler.grid_y,
        sampler.jitter,
        cloth.len()
    );
    for (cell, dot) in selection.entries() {
        let position = cloth
            .get(*dot)
            .and_then(|t| t.position(0))
            .map(|p| format!("({:.1}, {:.1})", p.x, p.y))
            .unwrap_or_default();
        println!("  cell ({}, {}) -> dot {dot} {position}", cell.ix, cell.iy);
    }
    println!(
        "\nSelected {} of {} cells.",
        selection.len(),
        selection.cell_count()
    );
    if selection.is_exhausted() {
        println!("Dot pool ran out before every cell was filled.");
    }

    Ok(())
}
