//! Engine configuration: catalog, Consent Mode table and behavior flags.
//!
//! Loaded from YAML or JSON. `CMP_EVENT_SOURCE` and
//! `CMP_ATT_GATES_AD_SIGNALS` override the file.

mod host;

pub use host::{BackgroundStyle, ScreenPosition, UrlConfig, WebViewConfig};

use crate::catalog::{Catalog, CatalogDef};
use crate::errors::{ConsentError, ConsentResult};
use crate::signals::{ConsentModeMapping, SignalMapper};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const ENV_EVENT_SOURCE: &str = "CMP_EVENT_SOURCE";
pub const ENV_ATT_GATES_AD_SIGNALS: &str = "CMP_ATT_GATES_AD_SIGNALS";

pub const DEFAULT_EVENT_SOURCE: &str = "cmp://engine";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub catalog: CatalogDef,

    /// Purpose → Consent Mode signals. When absent, the built-in table is
    /// used, restricted to purposes the catalog defines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_mode: Option<ConsentModeMapping>,

    /// Deny ad signals while ATT is denied or restricted.
    #[serde(default = "default_true")]
    pub att_gates_ad_signals: bool,

    /// Apply purpose defaults when the engine is first configured.
    #[serde(default)]
    pub resolve_defaults_on_configure: bool,

    #[serde(default = "default_event_source")]
    pub event_source: String,
}

fn default_true() -> bool {
    true
}

fn default_event_source() -> String {
    DEFAULT_EVENT_SOURCE.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogDef::default(),
            consent_mode: None,
            att_gates_ad_signals: true,
            resolve_defaults_on_configure: false,
            event_source: default_event_source(),
        }
    }
}

impl EngineConfig {
    pub fn new(catalog: CatalogDef) -> Self {
        Self {
            catalog,
            ..Default::default()
        }
    }

    /// Load from a `.json`, `.yaml` or `.yml` file, apply environment
    /// overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config: {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let mut config = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        config.apply_env_overrides()?;
        config
            .validate()
            .with_context(|| format!("invalid engine config: {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            purposes = config.catalog.purposes.len(),
            vendors = config.catalog.vendors.len(),
            "engine config loaded"
        );
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("failed to parse engine config YAML")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse engine config JSON")
    }

    pub fn apply_env_overrides(&mut self) -> ConsentResult<()> {
        if let Ok(source) = std::env::var(ENV_EVENT_SOURCE) {
            self.event_source = source;
        }
        if let Ok(raw) = std::env::var(ENV_ATT_GATES_AD_SIGNALS) {
            self.att_gates_ad_signals = parse_bool(&raw).ok_or_else(|| {
                ConsentError::invalid_config(format!(
                    "{ENV_ATT_GATES_AD_SIGNALS} must be a boolean, got {raw:?}"
                ))
            })?;
        }
        Ok(())
    }

    /// Validate and build the catalog.
    pub fn validate(&self) -> ConsentResult<Catalog> {
        if self.event_source.trim().is_empty() {
            return Err(ConsentError::invalid_config("event_source must not be empty"));
        }
        let catalog = Catalog::from_def(&self.catalog)?;
        if let Some(mapping) = &self.consent_mode {
            if let Some(id) = mapping.purposes().find(|id| !catalog.has_purpose(id)) {
                return Err(ConsentError::invalid_config(format!(
                    "consent_mode references unknown purpose {id}"
                )));
            }
        }
        Ok(catalog)
    }

    /// The effective purpose → signal table for this catalog.
    pub fn consent_mode_mapping(&self) -> ConsentModeMapping {
        match &self.consent_mode {
            Some(mapping) => mapping.clone(),
            None => {
                let mut mapping = ConsentModeMapping::default();
                mapping
                    .0
                    .retain(|purpose, _| self.catalog.purposes.iter().any(|p| &p.id == purpose));
                mapping
            }
        }
    }

    pub fn signal_mapper(&self) -> SignalMapper {
        SignalMapper::new(self.consent_mode_mapping(), self.att_gates_ad_signals)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
