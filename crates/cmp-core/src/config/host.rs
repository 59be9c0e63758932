//! Host-supplied UI configuration objects.
//!
//! The host hands these over as loose key/value objects. Only the keys below
//! are recognized; anything else is rejected with the offending key named.

use crate::errors::{ConsentError, ConsentResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where and for whom the consent UI is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UrlConfig {
    pub id: String,
    pub domain: String,
    /// ISO 639-1 code, stored lowercase.
    pub language: String,
    pub app_name: String,
    #[serde(default)]
    pub no_hash: bool,
}

impl UrlConfig {
    pub fn from_value(value: Value) -> ConsentResult<Self> {
        let mut config: Self = serde_json::from_value(value)
            .map_err(|e| ConsentError::invalid_config(format!("url config: {e}")))?;
        config.language = config.language.to_ascii_lowercase();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConsentResult<()> {
        if self.id.trim().is_empty() {
            return Err(ConsentError::invalid_config("url config: id must not be empty"));
        }
        if self.domain.trim().is_empty() {
            return Err(ConsentError::invalid_config(
                "url config: domain must not be empty",
            ));
        }
        if self.language.len() != 2 || !self.language.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConsentError::invalid_config(format!(
                "url config: language must be a 2-letter code, got {:?}",
                self.language
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ScreenPosition {
    #[default]
    FullScreen,
    HalfScreenTop,
    HalfScreenBottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum BackgroundStyle {
    #[default]
    Dimmed,
    Blur,
    None,
}

/// Presentation hints for the embedded consent view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct WebViewConfig {
    pub position: ScreenPosition,
    pub background_style: BackgroundStyle,
    pub corner_radius: f64,
    pub respects_safe_area: bool,
    pub allows_orientation_changes: bool,
}

impl Default for WebViewConfig {
    fn default() -> Self {
        Self {
            position: ScreenPosition::FullScreen,
            background_style: BackgroundStyle::Dimmed,
            corner_radius: 5.0,
            respects_safe_area: true,
            allows_orientation_changes: true,
        }
    }
}

impl WebViewConfig {
    pub fn from_value(value: Value) -> ConsentResult<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| ConsentError::invalid_config(format!("web view config: {e}")))?;
        if !config.corner_radius.is_finite() || config.corner_radius < 0.0 {
            return Err(ConsentError::invalid_config(format!(
                "web view config: cornerRadius must be a non-negative number, got {}",
                config.corner_radius
            )));
        }
        Ok(config)
    }
}
