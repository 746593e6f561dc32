//! Configuration loader for Patchflow.
//!
//! Reads `patchflow.toml` from the given directory and deserializes it into
//! [`PatchflowConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::Path;

use patchflow_types::config::PatchflowConfig;

/// Load configuration from `{dir}/patchflow.toml`.
///
/// - If the file does not exist, returns [`PatchflowConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the
///   default.
/// - Otherwise returns the parsed config (missing sections keep defaults).
pub async fn load_config(dir: &Path) -> PatchflowConfig {
    let config_path = dir.join("patchflow.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no patchflow.toml at {}, using defaults", config_path.display());
            return PatchflowConfig::default();
        }
        Err(err) => {
            tracing::warn!("failed to read {}: {err}, using defaults", config_path.display());
            return PatchflowConfig::default();
        }
    };

    match toml::from_str::<PatchflowConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            PatchflowConfig::default()
        }
    }
}
