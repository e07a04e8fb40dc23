//! # Beacon
//!
//! Last-chance delivery of the pending queue when the page is torn down. Sends are
//! fire-and-forget: the caller never learns whether the payload arrived.

use crate::config::AnalyticsConfig;
use crate::event::AnalyticsEvent;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

/// Wire body: `{"events": [...]}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeaconPayload {
    pub events: Vec<serde_json::Value>,
}

impl BeaconPayload {
    pub fn from_events(events: &[AnalyticsEvent]) -> serde_json::Result<Self> {
        let events = events
            .iter()
            .map(AnalyticsEvent::to_json)
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(Self { events })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub trait BeaconTransport: Send + Sync {
    /// Hands `payload` off for delivery without waiting for the outcome.
    fn send(&self, payload: BeaconPayload);
}

#[derive(Debug, Clone, Default)]
pub struct NoopBeacon;

impl BeaconTransport for NoopBeacon {
    fn send(&self, _payload: BeaconPayload) {}
}

/// Posts beacon payloads as JSON from a detached Tokio task.
#[derive(Debug, Clone)]
pub struct HttpBeacon {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpBeacon {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Builds a beacon from `beacon_url`, or `None` when no endpoint is configured.
    pub fn from_config(config: &AnalyticsConfig) -> anyhow::Result<Option<Self>> {
        config
            .beacon_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw)
                    .map(Self::new)
                    .with_context(|| format!("Invalid beacon url '{raw}'"))
            })
            .transpose()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl BeaconTransport for HttpBeacon {
    fn send(&self, payload: BeaconPayload) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(events = payload.len(), "No async runtime; dropping beacon");
            return;
        };

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        runtime.spawn(async move {
            let events = payload.len();
            match client.post(endpoint).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!(events, "Beacon delivered");
                }
                Ok(resp) => {
                    tracing::debug!(events, status = %resp.status(), "Beacon rejected");
                }
                Err(e) => {
                    tracing::debug!(events, error = %e, "Beacon delivery failed");
                }
            }
        });
    }
}
