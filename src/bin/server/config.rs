//! Server Configuration
//!
//! Config discovery for the server binary.

use lumen_tsdb::config::ApplicationConfig;
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "application.toml";

/// Load configuration from file or environment
///
/// Priority:
/// 1. `--config` flag
/// 2. `LUMEN_CONFIG` environment variable
/// 3. `./application.toml`
/// 4. Default configuration
///
/// Environment overrides (`LUMEN_HTTP_ADDR` and friends) apply on top of
/// whichever source wins. An explicitly named file that fails to load is
/// an error; the fallback file only warns.
pub fn load_config(explicit: Option<&Path>) -> Result<ApplicationConfig, lumen_tsdb::Error> {
    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("LUMEN_CONFIG").map(PathBuf::from));

    if let Some(path) = named {
        let config = ApplicationConfig::from_file_with_env(&path)?;
        eprintln!("[config] Loaded configuration from: {}", path.display());
        return Ok(config);
    }

    let fallback = Path::new(DEFAULT_CONFIG_FILE);
    if fallback.exists() {
        match ApplicationConfig::from_file_with_env(fallback) {
            Ok(config) => {
                eprintln!("[config] Loaded configuration from {}", DEFAULT_CONFIG_FILE);
                return Ok(config);
            },
            Err(e) => {
                eprintln!(
                    "[config] Failed to parse {}: {}. Using defaults.",
                    DEFAULT_CONFIG_FILE, e
                );
            },
        }
    }

    eprintln!("[config] Using default configuration");
    Ok(ApplicationConfig::from_env())
}
