//! Browser-automation profiles.
//!
//! Profiles are listed and started through the backend; the pool's
//! connection status is then re-read by the browser-pool machine, which stays
//! the only writer of that status.

use std::sync::Arc;

use futures::future::join_all;
use itertools::Itertools;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{ConnectionMachine, PoolTarget, RefreshMode};
use crate::error::PanelError;
use crate::gateway::{paths, Endpoint, Method, SharedGateway};
use crate::notify::Notifier;

/// One automation profile offered by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrowserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "profile id must be a string or number, got {other}"
        ))),
    }
}

/// Outcome of starting a batch of profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartSummary {
    pub started: usize,
    pub failed: usize,
}

impl StartSummary {
    pub fn message(&self) -> String {
        if self.failed > 0 {
            format!("{} profiles started, {} failed", self.started, self.failed)
        } else {
            format!("All {} profiles started successfully", self.started)
        }
    }
}

pub struct BrowserPool {
    machine: Arc<ConnectionMachine>,
    gateway: SharedGateway,
    notifier: Notifier,
}

impl BrowserPool {
    pub fn new(machine: Arc<ConnectionMachine>, gateway: SharedGateway, notifier: Notifier) -> Self {
        Self {
            machine,
            gateway,
            notifier,
        }
    }

    pub fn machine(&self) -> &Arc<ConnectionMachine> {
        &self.machine
    }

    /// List the profiles available at `target`.
    pub async fn fetch_profiles(&self, target: &PoolTarget) -> Result<Vec<BrowserProfile>, PanelError> {
        let target = self.validated(target)?;
        let endpoint = Endpoint::new(paths::BROWSER_PROFILES)
            .with_query("api_url", target.api_url.as_str())
            .with_query("type", target.kind.as_str());

        let response = self.gateway.request(endpoint, Method::Get, None).await;
        let profiles = response
            .into_result("Failed to fetch profiles")
            .and_then(|response| {
                let raw = response.get("profiles").cloned().ok_or_else(|| {
                    PanelError::UnexpectedResponse("profiles missing".into())
                })?;
                serde_json::from_value::<Vec<BrowserProfile>>(raw)
                    .map_err(|err| PanelError::UnexpectedResponse(err.to_string()))
            });

        match profiles {
            Ok(profiles) => {
                info!(kind = target.kind.as_str(), count = profiles.len(), "profiles fetched");
                self.notifier.info(format!("{} profiles found", profiles.len()));
                Ok(profiles)
            }
            Err(err) => {
                warn!(error = %err, "fetching profiles failed");
                self.notifier.error(err.to_string());
                Err(err)
            }
        }
    }

    /// Start every selected profile concurrently, then re-read the pool
    /// status.
    pub async fn start_profiles(
        &self,
        target: &PoolTarget,
        profile_ids: &[String],
    ) -> Result<StartSummary, PanelError> {
        if profile_ids.is_empty() {
            let err = PanelError::Validation("Please select at least one profile".into());
            self.notifier.error(err.to_string());
            return Err(err);
        }
        let target = self.validated(target)?;

        let requests = profile_ids.iter().map(|profile_id| {
            let body = json!({
                "api_url": target.api_url,
                "type": target.kind.as_str(),
                "profile_id": profile_id,
            });
            self.gateway
                .request(Endpoint::new(paths::BROWSER_START), Method::Post, Some(body))
        });
        let responses = join_all(requests).await;

        let (ok, failed): (Vec<_>, Vec<_>) = responses
            .iter()
            .zip(profile_ids)
            .partition(|(response, _)| response.is_success());
        let summary = StartSummary {
            started: ok.len(),
            failed: failed.len(),
        };

        if summary.failed > 0 {
            warn!(
                failed = %failed.iter().map(|(_, id)| id.as_str()).join(","),
                "some profiles failed to start"
            );
            self.notifier.warning(summary.message());
        } else {
            info!(started = summary.started, "profiles started");
            self.notifier.success(summary.message());
        }

        if let Err(err) = self.machine.refresh(RefreshMode::Explicit).await {
            warn!(error = %err, "browser pool status refresh after start failed");
        }
        Ok(summary)
    }

    fn validated(&self, target: &PoolTarget) -> Result<PoolTarget, PanelError> {
        target.validated().map_err(|err| {
            self.notifier.error(err.to_string());
            err
        })
    }
}
