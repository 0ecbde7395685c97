//! Per-round configuration.
//!
//! Stored as JSON on the round row. Every recognized key is a field here;
//! unknown keys are rejected when the round is created or edited.

use jury_common::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Disqualification and display settings of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoundConfig {
    /// Disqualify entries uploaded outside the campaign window.
    pub dq_by_upload_date: bool,
    /// Disqualify entries below `min_resolution` pixels.
    pub dq_by_resolution: bool,
    /// Disqualify entries uploaded by privileged users (see `dq_coords`,
    /// `dq_organizers`, `dq_maintainers`).
    pub dq_by_uploader: bool,
    /// Disqualify entries whose MIME type is not in `allowed_filetypes`.
    pub dq_by_filetype: bool,
    /// Uploader rule covers campaign coordinators.
    pub dq_coords: bool,
    /// Uploader rule covers organizers.
    pub dq_organizers: bool,
    /// Uploader rule covers maintainers.
    pub dq_maintainers: bool,
    /// Minimum `width * height`.
    pub min_resolution: i64,
    /// Accepted MIME types or subtypes, e.g. `jpeg` or `image/png`.
    pub allowed_filetypes: Vec<String>,
    pub show_link: bool,
    pub show_filename: bool,
    pub show_resolution: bool,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            dq_by_upload_date: false,
            dq_by_resolution: false,
            dq_by_uploader: false,
            dq_by_filetype: false,
            dq_coords: true,
            dq_organizers: true,
            dq_maintainers: false,
            min_resolution: 2_000_000,
            allowed_filetypes: ["jpeg", "png", "gif", "svg+xml", "tiff", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            show_link: true,
            show_filename: true,
            show_resolution: true,
        }
    }
}

impl RoundConfig {
    /// Parse a config object supplied by a coordinator. Missing keys take
    /// their defaults; unknown keys and wrong types are rejected.
    pub fn from_json(value: &JsonValue) -> AppResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_value(value.clone())
            .map_err(|e| AppError::Validation(format!("invalid round config: {e}")))?;
        if config.min_resolution < 0 {
            return Err(AppError::Validation(
                "min_resolution must not be negative".to_string(),
            ));
        }
        Ok(config)
    }

    /// Read the config stored on a round row.
    pub fn from_stored(value: &JsonValue) -> AppResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| AppError::Internal(format!("stored round config is unreadable: {e}")))
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> AppResult<JsonValue> {
        serde_json::to_value(self).map_err(|e| AppError::Internal(e.to_string()))
    }

    /// Whether a MIME type is accepted by `allowed_filetypes`. Entries match
    /// either the full type or its subtype, ignoring case.
    #[must_use]
    pub fn allows_mime_type(&self, mime_type: &str) -> bool {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        let subtype = mime_type
            .split_once('/')
            .map_or(mime_type.as_str(), |(_, sub)| sub);
        self.allowed_filetypes.iter().any(|allowed| {
            let allowed = allowed.trim().to_ascii_lowercase();
            allowed == mime_type || allowed == subtype
        })
    }

    /// Merge another config object over this one, key by key.
    pub fn merged(&self, patch: &JsonValue) -> AppResult<Self> {
        let JsonValue::Object(patch) = patch else {
            return Err(AppError::Validation(
                "round config must be an object".to_string(),
            ));
        };
        let mut base = self.to_json()?;
        if let JsonValue::Object(fields) = &mut base {
            for (key, value) in patch {
                fields.insert(key.clone(), value.clone());
            }
        }
        Self::from_json(&base)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_keys_take_defaults() {
        let config = RoundConfig::from_json(&json!({"dq_by_resolution": true})).unwrap();
        assert!(config.dq_by_resolution);
        assert!(config.dq_coords);
        assert!(!config.dq_maintainers);
        assert_eq!(config.min_resolution, 2_000_000);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = RoundConfig::from_json(&json!({"dq_by_colour": true})).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_null_is_default() {
        assert_eq!(
            RoundConfig::from_json(&JsonValue::Null).unwrap(),
            RoundConfig::default()
        );
    }

    #[test]
    fn test_mime_type_matching() {
        let config = RoundConfig::default();
        assert!(config.allows_mime_type("image/jpeg"));
        assert!(config.allows_mime_type("IMAGE/PNG"));
        assert!(config.allows_mime_type("image/svg+xml"));
        assert!(!config.allows_mime_type("application/pdf"));

        let strict = RoundConfig {
            allowed_filetypes: vec!["image/png".to_string()],
            ..RoundConfig::default()
        };
        assert!(strict.allows_mime_type("image/png"));
        assert!(!strict.allows_mime_type("image/jpeg"));
    }

    #[test]
    fn test_merged_keeps_existing_values() {
        let base = RoundConfig {
            dq_by_filetype: true,
            ..RoundConfig::default()
        };
        let merged = base.merged(&json!({"min_resolution": 500})).unwrap();
        assert!(merged.dq_by_filetype);
        assert_eq!(merged.min_resolution, 500);

        assert!(base.merged(&json!({"nope": 1})).is_err());
    }
}
