//! # Connectivity Prober
//!
//! Answers one question: can the catalog service be reached right now?
//!
//! ## Probe Outcomes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  HEAD /api/menu-items (5 s, no-cache)                   │
//! │                                                                         │
//! │  2xx ──────────────────────► is_online = true,  status_code = Some(..)  │
//! │  other status ─────────────► is_online = false, status_code = Some(..)  │
//! │  timeout / refused / DNS ──► is_online = false, error_detail = Some(..) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `check()` never fails. The latest report is cached for status displays.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::api::RemoteCatalog;

/// Result of one liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub is_online: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    pub checked_at: DateTime<Utc>,
}

impl ProbeReport {
    pub fn from_status(status: u16) -> Self {
        ProbeReport {
            is_online: (200..300).contains(&status),
            status_code: Some(status),
            error_detail: None,
            checked_at: Utc::now(),
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        ProbeReport {
            is_online: false,
            status_code: None,
            error_detail: Some(detail.into()),
            checked_at: Utc::now(),
        }
    }

    /// One-line description for logs and status output.
    pub fn summary(&self) -> String {
        match (self.is_online, self.status_code, &self.error_detail) {
            (true, Some(code), _) => format!("online (HTTP {})", code),
            (true, None, _) => "online".to_string(),
            (false, Some(code), _) => format!("offline (HTTP {})", code),
            (false, None, Some(detail)) => format!("offline ({})", detail),
            (false, None, None) => "offline".to_string(),
        }
    }
}

/// Probes the catalog service and remembers the last answer.
#[derive(Clone)]
pub struct ConnectivityProber {
    remote: Arc<dyn RemoteCatalog>,
    last: Arc<RwLock<Option<ProbeReport>>>,
}

impl ConnectivityProber {
    pub fn new(remote: Arc<dyn RemoteCatalog>) -> Self {
        ConnectivityProber {
            remote,
            last: Arc::new(RwLock::new(None)),
        }
    }

    /// Runs a fresh probe.
    pub async fn check(&self) -> ProbeReport {
        let report = match self.remote.probe().await {
            Ok(status) => ProbeReport::from_status(status),
            Err(e) => ProbeReport::unreachable(e.to_string()),
        };

        let previous = self.last.write().await.replace(report.clone());
        match previous {
            Some(prev) if prev.is_online != report.is_online => {
                info!(status = %report.summary(), "Catalog service connectivity changed");
            }
            _ => debug!(status = %report.summary(), "Connectivity probe"),
        }

        report
    }

    /// Shorthand for `check().await.is_online`.
    pub async fn is_online(&self) -> bool {
        self.check().await.is_online
    }

    /// The most recent report, if any probe has run.
    pub async fn last_report(&self) -> Option<ProbeReport> {
        self.last.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpCatalogClient;
    use crate::config::TimeoutSettings;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prober(uri: &str) -> ConnectivityProber {
        let client = HttpCatalogClient::new(uri, TimeoutSettings::default()).unwrap();
        ConnectivityProber::new(Arc::new(client))
    }

    #[tokio::test]
    async fn test_online() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/api/menu-items"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let prober = prober(&server.uri());
        assert!(prober.last_report().await.is_none());

        let report = prober.check().await;
        assert!(report.is_online);
        assert_eq!(report.status_code, Some(200));
        assert_eq!(prober.last_report().await, Some(report));
    }

    #[tokio::test]
    async fn test_server_error_is_offline() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/api/menu-items"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let report = prober(&server.uri()).check().await;
        assert!(!report.is_online);
        assert_eq!(report.status_code, Some(500));
        assert_eq!(report.summary(), "offline (HTTP 500)");
    }

    #[tokio::test]
    async fn test_unreachable_is_offline() {
        let report = prober("http://127.0.0.1:9").check().await;
        assert!(!report.is_online);
        assert!(report.status_code.is_none());
        assert!(report.error_detail.is_some());
    }

    #[tokio::test]
    async fn test_timeout_is_offline() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/api/menu-items"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(3)))
            .mount(&server)
            .await;

        let timeouts = TimeoutSettings {
            probe_secs: 1,
            ..TimeoutSettings::default()
        };
        let client = HttpCatalogClient::new(server.uri(), timeouts).unwrap();
        let report = ConnectivityProber::new(Arc::new(client)).check().await;

        assert!(!report.is_online);
        assert!(report.error_detail.unwrap().contains("timed out"));
    }
}
