//! Run a trial and write its telemetry.

use std::path::PathBuf;

use clothstim_common::clock::wall_clock_now;
use clothstim_common::config::AppConfig;
use clothstim_engine::{
    run_trial, CsvTelemetryWriter, RealtimeDriver, RecordingSurface, SimulatedRefresh,
    TrialEngine, TrialResult,
};
use clothstim_model::trajectory::load_cloth;

pub struct RunArgs {
    pub trajectories: PathBuf,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub simulate: bool,
    pub refresh_hz: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub seed: Option<u64>,
    pub summary: bool,
}

pub async fn run(app: &AppConfig, args: RunArgs) -> anyhow::Result<()> {
    let mut config = super::load_trial_config(args.config.as_deref())?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let cloth = load_cloth(&args.trajectories).map_err(|e| {
        tracing::error!(path = %args.trajectories.display(), error = %e, "Trajectory load failed");
        anyhow::anyhow!("Failed to load trajectories: {e}")
    })?;
    tracing::info!(
        path = %args.trajectories.display(),
        dots = cloth.len(),
        frames = cloth.frame_count(),
        "Loaded trajectories"
    );

    let refresh_hz = args.refresh_hz.unwrap_or(app.display.refresh_hz);
    let width = args.width.unwrap_or(app.display.width);
    let height = args.height.unwrap_or(app.display.height);
    let output = args.output.unwrap_or_else(|| default_output_path(app));

    let mut writer = CsvTelemetryWriter::new(output.clone()).map_err(|e| {
        tracing::error!(output = %output.display(), error = %e, "Telemetry output unavailable");
        anyhow::anyhow!("Failed to open telemetry output: {e}")
    })?;
    if args.summary {
        writer = writer.with_summary();
    }

    println!("Running trial: {}", args.trajectories.display());
    println!("  Dots: {}  Frames: {}", cloth.len(), cloth.frame_count());
    println!("  Surface: {width}x{height} @ {refresh_hz} Hz");
    println!("  ISI: {} ms ({})", config.isi_ms, config.isi_mode.as_str());
    println!(
        "  Clock: {}",
        if args.simulate { "simulated" } else { "realtime" }
    );
    println!();

    let mut surface = RecordingSurface::counting(width, height);
    let mut engine =
        TrialEngine::setup(config, &cloth, &surface, Box::new(writer)).map_err(|e| {
            tracing::error!(error = %e, "Trial setup failed");
            anyhow::anyhow!("Trial setup failed: {e}")
        })?;
    tracing::info!(
        simulate = args.simulate,
        refresh_hz,
        output = %output.display(),
        "Starting trial"
    );

    let result = if args.simulate {
        let mut source = SimulatedRefresh::new(refresh_hz);
        run_trial(&mut engine, &mut source, &mut surface)
    } else {
        let driver = RealtimeDriver::new(refresh_hz);
        let stop = driver.stop_flag();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Cancel requested");
                stop.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        });
        println!("Press Ctrl+C to cancel...");
        driver.run(&mut engine, &mut surface).await
    };
    drop(engine);

    print_result(&result);
    println!("Telemetry saved to: {}", output.display());
    if let Some(error) = &result.export_error {
        tracing::error!(output = %output.display(), error = %error, "Telemetry export failed");
        anyhow::bail!("Telemetry export failed: {error}");
    }
    Ok(())
}

fn default_output_path(app: &AppConfig) -> PathBuf {
    let stamp: String = wall_clock_now()
        .chars()
        .take(19)
        .map(|c| if c == ':' { '-' } else { c })
        .collect();
    app.output_dir.join(format!("trial-{stamp}.csv"))
}

fn print_result(result: &TrialResult) {
    println!("Trial {:?}", result.reason);
    println!(
        "  Ticks: {} ({} visible, {} blank)",
        result.ticks, result.visible_ticks, result.blank_ticks
    );
    println!(
        "  Frame changes: {}  Size steps: {}",
        result.frame_changes, result.size_steps
    );
    println!("  Selected dots: {}", result.selected_dots);
    println!(
        "  Duration: {:.3}s planned, {:.3}s measured",
        result.planned_duration_secs, result.measured_duration_secs
    );
    if let (Some(min), Some(max), Some(mean)) =
        (result.scale_min, result.scale_max, result.scale_mean)
    {
        println!("  Scale: min {min:.3}  max {max:.3}  mean {mean:.3}");
    }
    if !result.degeneracies.is_empty() {
        println!("  Degenerate conditions:");
        for degeneracy in &result.degeneracies {
            println!("    - {degeneracy:?}");
        }
    }
}
