//! Discovery and persistence for `.wingman/wingman.config.json`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::WingmanConfig};

const WORKSPACE_CONFIG_RELATIVE: &str = ".wingman/wingman.config.json";
const HOME_CONFIG_FILENAME: &str = "gateway.json";

/// `$HOME/.wingman`, honoring the `WINGMAN_HOME` test override.
#[must_use]
pub fn wingman_home() -> PathBuf {
    if let Ok(dir) = std::env::var("WINGMAN_HOME") {
        return PathBuf::from(dir);
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".wingman"))
        .unwrap_or_else(|| PathBuf::from(".wingman"))
}

/// Walk up from `start` looking for `.wingman/wingman.config.json`.
fn find_workspace_config(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start.to_path_buf());
    while let Some(d) = dir {
        let candidate = d.join(WORKSPACE_CONFIG_RELATIVE);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = d.parent().map(Path::to_path_buf);
    }
    None
}

/// Resolve the config path to load, in order:
/// 1. `WINGMAN_GATEWAY_CONFIG` env var, if set.
/// 2. The nearest `.wingman/wingman.config.json` walking up from `cwd`.
/// 3. `$HOME/.wingman/gateway.json`, if it exists.
#[must_use]
pub fn find_config_path(cwd: &Path) -> Option<PathBuf> {
    if let Ok(path) = std::env::var("WINGMAN_GATEWAY_CONFIG") {
        return Some(PathBuf::from(path));
    }
    if let Some(path) = find_workspace_config(cwd) {
        return Some(path);
    }
    let home_config = wingman_home().join(HOME_CONFIG_FILENAME);
    home_config.is_file().then_some(home_config)
}

/// Load and parse a config file, applying `${ENV_VAR}` substitution first.
pub fn load_config(path: &Path) -> anyhow::Result<WingmanConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))
}

/// Discover and load config from standard locations, falling back to
/// [`WingmanConfig::default`] when nothing is found or parsing fails.
#[must_use]
pub fn discover_and_load(cwd: &Path) -> WingmanConfig {
    match find_config_path(cwd) {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            match load_config(&path) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                    WingmanConfig::default()
                },
            }
        },
        None => {
            debug!("no config file found, using defaults");
            WingmanConfig::default()
        },
    }
}

/// Serialize `config` to the daemon's side file (`$HOME/.wingman/gateway.json`)
/// so `restart()` can reconstruct the running configuration.
pub fn save_config(config: &WingmanConfig) -> anyhow::Result<PathBuf> {
    let path = wingman_home().join(HOME_CONFIG_FILENAME);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    debug!(path = %path.display(), "saved config");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_and_load_falls_back_to_defaults_in_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        unsafe {
            std::env::remove_var("WINGMAN_GATEWAY_CONFIG");
        }
        let config = discover_and_load(dir.path());
        assert_eq!(config.gateway.port, 7777);
    }

    #[test]
    fn finds_nearest_workspace_config_walking_up() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        let wingman_dir = root.path().join(".wingman");
        std::fs::create_dir_all(&wingman_dir).unwrap();
        std::fs::write(
            wingman_dir.join("wingman.config.json"),
            r#"{"gateway": {"port": 9999}}"#,
        )
        .unwrap();

        unsafe {
            std::env::remove_var("WINGMAN_GATEWAY_CONFIG");
        }
        let config = discover_and_load(&nested);
        assert_eq!(config.gateway.port, 9999);
    }

    #[test]
    fn env_var_override_takes_precedence() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("custom.json");
        std::fs::write(&path, r#"{"gateway": {"port": 1234}}"#).unwrap();
        unsafe {
            std::env::set_var("WINGMAN_GATEWAY_CONFIG", &path);
        }
        let config = discover_and_load(root.path());
        unsafe {
            std::env::remove_var("WINGMAN_GATEWAY_CONFIG");
        }
        assert_eq!(config.gateway.port, 1234);
    }
}
