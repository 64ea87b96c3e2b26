use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grade;
use crate::models::GradeScaleEntry;

pub const DEFAULT_TARGET_SKS: i32 = 144;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "grade::default_scale")]
    pub grade_scale: Vec<GradeScaleEntry>,
    #[serde(default = "default_target_sks")]
    pub target_sks: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grade_scale: grade::default_scale(),
            target_sks: DEFAULT_TARGET_SKS,
        }
    }
}

fn default_target_sks() -> i32 {
    DEFAULT_TARGET_SKS
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: Settings = serde_json::from_str(text)?;
        Ok(raw.sanitized())
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads from `path` when given, otherwise falls back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn sanitized(self) -> Self {
        Self {
            grade_scale: grade::sanitize_scale(self.grade_scale),
            target_sks: self.target_sks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GradeColor;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn parsed_scale_is_sanitized() {
        let text = r#"{
            "grade_scale": [
                { "min_score": 0, "details": { "letter": "e", "point": 0.0, "color": "gray" } },
                { "min_score": 80, "details": { "letter": "a", "point": 4.0, "color": "gray" } },
                { "min_score": 60, "details": { "letter": " ", "point": 2.0, "color": "gray" } }
            ],
            "target_sks": 146
        }"#;
        let settings = Settings::from_json(text).unwrap();
        assert_eq!(settings.target_sks, 146);
        assert_eq!(settings.grade_scale.len(), 2);
        assert_eq!(settings.grade_scale[0].details.letter, "A");
        assert_eq!(settings.grade_scale[0].details.color, GradeColor::Green);
        assert_eq!(settings.grade_scale[1].min_score, 0.0);
    }

    #[test]
    fn empty_scale_is_kept_empty() {
        let settings = Settings::from_json(r#"{ "grade_scale": [] }"#).unwrap();
        assert!(settings.grade_scale.is_empty());
    }

    #[test]
    fn bundled_settings_match_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/settings.json");
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Settings::load(Path::new("/nonexistent/settings.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/settings.json"));
        assert!(Settings::load_or_default(None).is_ok());
    }
}
