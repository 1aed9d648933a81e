//! Pipeline configuration.
//!
//! Loaded from a TOML file and passed explicitly into every pipeline call.
//! There is no global configuration lookup.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [quality]
//! jpeg = 100                # JPEG quality (1-100)
//! png = 8                   # PNG compression level (1-9)
//!
//! [limits]
//! max_image_length = -1     # Longest side after upload; <= 0 keeps the original
//! max_upload_bytes = 0      # Reject larger uploads; 0 = no limit
//!
//! [urls]
//! base_url = "http://localhost"
//! ```
//!
//! Encoder settings are forgiving: a quality of 0 or one above the valid
//! range silently falls back to the default (see [`PhotoConfig::sanitized`]).
//! Everything else that is wrong is a [`ConfigError::Validation`].
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{EncodeSettings, PngLevel, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Everything the pipeline needs to know up front.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhotoConfig {
    /// Encoder quality settings.
    pub quality: QualityConfig,
    /// Size limits applied to uploads.
    pub limits: LimitsConfig,
    /// Where stored derivatives are served from.
    pub urls: UrlsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// JPEG quality (1 = worst, 100 = best).
    pub jpeg: u32,
    /// PNG compression level (1 = fastest, 9 = smallest).
    pub png: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self { jpeg: 100, png: 8 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Longest side of the full-size derivative. Zero or negative disables
    /// the limit.
    pub max_image_length: i64,
    /// Maximum upload size in bytes. Zero disables the limit.
    pub max_upload_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_length: -1,
            max_upload_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UrlsConfig {
    /// Site base URL without trailing slash.
    pub base_url: String,
}

impl Default for UrlsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
        }
    }
}

impl PhotoConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.urls.base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::Validation("urls.base_url must not be empty".into()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "urls.base_url must be an http(s) URL, got {base:?}"
            )));
        }
        Ok(())
    }

    /// Copy with out-of-range encoder settings replaced by their defaults.
    pub fn sanitized(&self) -> Self {
        let defaults = QualityConfig::default();
        let mut config = self.clone();
        if config.quality.jpeg == 0 || config.quality.jpeg > 100 {
            tracing::debug!(jpeg = config.quality.jpeg, "jpeg quality out of range, using default");
            config.quality.jpeg = defaults.jpeg;
        }
        if config.quality.png == 0 || config.quality.png > 9 {
            tracing::debug!(png = config.quality.png, "png level out of range, using default");
            config.quality.png = defaults.png;
        }
        config
    }

    /// Encoder settings after sanitizing.
    pub fn encode_settings(&self) -> EncodeSettings {
        let quality = self.sanitized().quality;
        EncodeSettings {
            jpeg_quality: Quality::new(quality.jpeg),
            png_level: PngLevel::new(quality.png),
        }
    }

    /// Longest side for the full derivative, if limited.
    pub fn max_image_length(&self) -> Option<u32> {
        u32::try_from(self.limits.max_image_length)
            .ok()
            .filter(|&n| n > 0)
    }

    /// Upload byte limit, if any.
    pub fn max_upload_bytes(&self) -> Option<u64> {
        Some(self.limits.max_upload_bytes).filter(|&n| n > 0)
    }
}

/// Parse and validate a config from TOML text.
pub fn parse_config(content: &str) -> Result<PhotoConfig, ConfigError> {
    let config: PhotoConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file.
///
/// A missing file yields the defaults. Unknown keys are rejected and the
/// result is validated.
pub fn load_config(path: &Path) -> Result<PhotoConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(PhotoConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Returns a fully-commented stock config with all keys and explanations.
pub fn stock_config_toml() -> &'static str {
    r##"# Photoscale Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Encoder quality
# ---------------------------------------------------------------------------
[quality]
# JPEG quality (1 = worst, 100 = best). 0 or > 100 falls back to 100.
jpeg = 100

# PNG compression level (1 = fastest, 9 = smallest). 0 or > 9 falls back to 8.
png = 8

# ---------------------------------------------------------------------------
# Upload limits
# ---------------------------------------------------------------------------
[limits]
# Longest side of the stored full-size image. 0 or negative keeps the
# uploaded size.
max_image_length = -1

# Reject uploads larger than this many bytes. 0 = no limit.
max_upload_bytes = 0

# ---------------------------------------------------------------------------
# URLs
# ---------------------------------------------------------------------------
[urls]
# Base URL derivatives are served under.
base_url = "http://localhost"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_expected_values() {
        let config = PhotoConfig::default();
        assert_eq!(config.quality.jpeg, 100);
        assert_eq!(config.quality.png, 8);
        assert_eq!(config.limits.max_image_length, -1);
        assert_eq!(config.limits.max_upload_bytes, 0);
        assert_eq!(config.max_image_length(), None);
        assert_eq!(config.max_upload_bytes(), None);
    }

    #[test]
    fn load_config_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("photoscale.toml")).unwrap();
        assert_eq!(config, PhotoConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photoscale.toml");
        fs::write(
            &path,
            r#"
[limits]
max_image_length = 1600

[urls]
base_url = "https://social.example"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.max_image_length(), Some(1600));
        assert_eq!(config.urls.base_url, "https://social.example");
        // Unspecified values should be defaults
        assert_eq!(config.quality.jpeg, 100);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photoscale.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let result = parse_config("[quality]\nwebp = 80\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_section_rejected() {
        let result = parse_config("[storage]\npath = \"/tmp\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        assert!(matches!(
            parse_config("[urls]\nbase_url = \"\"\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            parse_config("[urls]\nbase_url = \"ftp://files\"\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(PhotoConfig::default().validate().is_ok());
    }

    #[test]
    fn sanitized_replaces_out_of_range_quality() {
        let config = parse_config("[quality]\njpeg = 0\npng = 12\n").unwrap();
        let clean = config.sanitized();
        assert_eq!(clean.quality.jpeg, 100);
        assert_eq!(clean.quality.png, 8);

        let config = parse_config("[quality]\njpeg = 150\npng = 0\n").unwrap();
        let clean = config.sanitized();
        assert_eq!(clean.quality.jpeg, 100);
        assert_eq!(clean.quality.png, 8);
    }

    #[test]
    fn sanitized_keeps_valid_quality() {
        let config = parse_config("[quality]\njpeg = 75\npng = 3\n").unwrap();
        assert_eq!(config.sanitized(), config);
        let settings = config.encode_settings();
        assert_eq!(settings.jpeg_quality.value(), 75);
        assert_eq!(settings.png_level.value(), 3);
    }

    #[test]
    fn non_positive_max_length_disables_limit() {
        for value in [0, -1, -500] {
            let config = parse_config(&format!("[limits]\nmax_image_length = {value}\n")).unwrap();
            assert_eq!(config.max_image_length(), None);
        }
    }

    #[test]
    fn upload_byte_limit() {
        let config = parse_config("[limits]\nmax_upload_bytes = 2048\n").unwrap();
        assert_eq!(config.max_upload_bytes(), Some(2048));
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config = parse_config(stock_config_toml()).unwrap();
        assert_eq!(config, PhotoConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        assert!(content.contains("[quality]"));
        assert!(content.contains("[limits]"));
        assert!(content.contains("[urls]"));
    }
}
