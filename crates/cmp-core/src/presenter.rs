//! UI collaborator that shows the consent layer.
//!
//! The engine decides *whether* and *how* to present; the presenter owns the
//! actual UI. It is always called with no engine lock held.

use crate::config::{UrlConfig, WebViewConfig};
use crate::errors::ConsentResult;
use crate::model::AttStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentMode {
    /// In-app consent layer.
    ConsentLayer,
    /// Redirect to the platform privacy settings (ATT denied or restricted).
    PlatformSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentRequest {
    pub mode: PresentMode,
    /// Set by `force_open`: present even if a decision already exists.
    pub forced: bool,
    pub url_config: UrlConfig,
    pub web_view_config: WebViewConfig,
    pub att_status: AttStatus,
}

#[async_trait]
pub trait ConsentPresenter: Send + Sync {
    /// Present the consent flow. Returns whether anything was shown.
    async fn present(&self, request: PresentRequest) -> ConsentResult<bool>;
}

/// Presenter for hosts without UI: logs the request, shows nothing.
pub struct HeadlessPresenter;

#[async_trait]
impl ConsentPresenter for HeadlessPresenter {
    async fn present(&self, request: PresentRequest) -> ConsentResult<bool> {
        tracing::info!(
            mode = ?request.mode,
            forced = request.forced,
            "headless presenter: consent UI not shown"
        );
        Ok(false)
    }
}
