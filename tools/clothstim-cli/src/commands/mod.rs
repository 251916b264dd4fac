pub mod init;
pub mod run;
pub mod sample;
pub mod validate;

use std::path::Path;

use clothstim_model::trial::TrialConfig;

/// Load a trial config, or fall back to defaults.
pub fn load_trial_config(path: Option<&Path>) -> anyhow::Result<TrialConfig> {
    match path {
        Some(path) => TrialConfig::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load trial config: {e}")),
        None => Ok(TrialConfig::default()),
    }
}
