//! Seed profile loading from disk.
//!
//! `.yaml`/`.yml` files parse as YAML, anything else as JSON. Every
//! loaded profile is validated before it is handed to the engine.

use std::path::Path;

use forgesim_core::{SeedError, SeedProfile};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("seed file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("seed file is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("seed profile rejected: {0}")]
    Invalid(#[from] SeedError),
}

/// Load and validate a seed profile from `path`.
pub fn load_seed(path: &Path) -> Result<SeedProfile, LoadError> {
    let raw = std::fs::read_to_string(path)?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let seed: SeedProfile = if is_yaml {
        serde_yaml::from_str(&raw)?
    } else {
        serde_json::from_str(&raw)?
    };
    seed.validate()?;
    info!(
        path = %path.display(),
        developers = seed.developers.len(),
        repositories = seed.repositories.len(),
        "seed profile loaded"
    );
    Ok(seed)
}

/// Load from `path` when given, otherwise fall back to the built-in demo
/// profile.
pub fn load_seed_or_demo(path: Option<&Path>) -> Result<SeedProfile, LoadError> {
    match path {
        Some(path) => load_seed(path),
        None => {
            info!("no seed file supplied, using built-in demo profile");
            Ok(SeedProfile::demo())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_named(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_json_seed_round_trips() {
        let seed = SeedProfile::demo();
        let file = write_named(".json", &serde_json::to_string_pretty(&seed).unwrap());
        let loaded = load_seed(file.path()).unwrap();
        assert_eq!(loaded, seed);
    }

    #[test]
    fn test_yaml_seed_round_trips() {
        let seed = SeedProfile::demo();
        let file = write_named(".yaml", &serde_yaml::to_string(&seed).unwrap());
        let loaded = load_seed(file.path()).unwrap();
        assert_eq!(loaded, seed);
    }

    #[test]
    fn test_invalid_profile_is_rejected() {
        let mut seed = SeedProfile::demo();
        seed.developers[0].acceptance_rate = 2.0;
        let file = write_named(".json", &serde_json::to_string(&seed).unwrap());
        assert!(matches!(
            load_seed(file.path()),
            Err(LoadError::Invalid(SeedError::AcceptanceRateOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_malformed_json_reports_parse_error() {
        let file = write_named(".json", "{ not json");
        assert!(matches!(load_seed(file.path()), Err(LoadError::Json(_))));
    }

    #[test]
    fn test_missing_file_reports_io_error() {
        let err = load_seed(Path::new("/nonexistent/seed.json")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_fallback_to_demo_profile() {
        let seed = load_seed_or_demo(None).unwrap();
        assert_eq!(seed, SeedProfile::demo());
    }
}
