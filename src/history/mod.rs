//! Command history.
//!
//! The backend is authoritative: a successful refresh replaces the local log
//! wholesale. Local submissions are appended optimistically, together with
//! the backend's reply, so the user sees the exchange before the next
//! refresh. The log never holds more than its limit; the oldest entries go
//! first.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::PanelError;
use crate::gateway::{paths, ApiResponse, Endpoint, Method, SharedGateway};
use crate::monitor::Refresh;

/// Default number of retained entries.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Who produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    Service,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub text: String,
    pub origin: Origin,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(text: impl Into<String>, origin: Origin) -> Self {
        Self {
            text: text.into(),
            origin,
            timestamp: Utc::now(),
        }
    }
}

/// One item of `command_history` as the backend stores it.
#[derive(Debug, Deserialize)]
struct RemoteEntry {
    command: Value,
    /// Stored as a bool or as 0/1 depending on the backend's store.
    #[serde(rename = "isUser", default)]
    is_user: Value,
    #[serde(default)]
    timestamp: Option<String>,
}

impl RemoteEntry {
    fn into_entry(self) -> Option<HistoryEntry> {
        let Value::String(text) = self.command else {
            return None;
        };
        let is_user = match self.is_user {
            Value::Bool(flag) => flag,
            Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
            _ => false,
        };
        let origin = if is_user {
            Origin::User
        } else {
            Origin::Service
        };
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        Some(HistoryEntry {
            text,
            origin,
            timestamp,
        })
    }
}

/// ISO-8601 with or without an offset; naive times are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Reply text for a command submission.
fn reply_text(result: Result<ApiResponse, PanelError>) -> String {
    match result {
        Ok(response) => match response.get("output") {
            Some(Value::String(output)) => output.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        },
        Err(err) => format!("Error: {err}"),
    }
}

pub struct HistoryChannel {
    gateway: SharedGateway,
    entries: watch::Sender<VecDeque<HistoryEntry>>,
    limit: usize,
    seq: AtomicU64,
}

impl HistoryChannel {
    pub fn new(gateway: SharedGateway, limit: usize) -> Self {
        let (entries, _) = watch::channel(VecDeque::new());
        Self {
            gateway,
            entries,
            limit: limit.max(1),
            seq: AtomicU64::new(0),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Snapshot of the log, oldest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.borrow().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<VecDeque<HistoryEntry>> {
        self.entries.subscribe()
    }

    /// Append an entry locally, evicting the oldest past the limit.
    ///
    /// Any refresh still in flight is superseded so it cannot wipe the entry.
    pub fn append(&self, entry: HistoryEntry) {
        self.seq.fetch_add(1, Ordering::SeqCst);
        let limit = self.limit;
        self.entries.send_modify(|entries| {
            entries.push_back(entry);
            while entries.len() > limit {
                entries.pop_front();
            }
        });
    }

    /// Send a command and log both sides of the exchange.
    ///
    /// Blank input is ignored. Otherwise the returned entry is the reply,
    /// which is logged whether or not the command succeeded.
    pub async fn submit(&self, text: &str) -> Option<HistoryEntry> {
        let command = text.trim();
        if command.is_empty() {
            return None;
        }

        self.append(HistoryEntry::new(command, Origin::User));
        debug!(command, "submitting command");

        let response = self
            .gateway
            .request(
                Endpoint::new(paths::COMMAND),
                Method::Post,
                Some(json!({ "command": command })),
            )
            .await;
        let result = response.into_result("Command execution failed");
        if let Err(err) = &result {
            warn!(error = %err, "command failed");
        }

        let reply = HistoryEntry::new(reply_text(result), Origin::Service);
        self.append(reply.clone());
        Some(reply)
    }

    /// Replace the log with the backend's copy.
    ///
    /// Returns the number of entries kept. On any failure the local log is
    /// left as it was.
    pub async fn refresh(&self) -> Result<usize, PanelError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let response = self
            .gateway
            .request(Endpoint::new(paths::COMMAND_HISTORY), Method::Get, None)
            .await
            .into_result("Failed to load command history")?;

        let Some(Value::Array(items)) = response.get("command_history") else {
            return Err(PanelError::UnexpectedResponse(
                "command_history is not a list".into(),
            ));
        };

        let mut rebuilt: VecDeque<HistoryEntry> = items
            .iter()
            .filter_map(|item| RemoteEntry::deserialize(item).ok())
            .filter_map(RemoteEntry::into_entry)
            .collect();
        while rebuilt.len() > self.limit {
            rebuilt.pop_front();
        }

        if self.seq.load(Ordering::SeqCst) != seq {
            debug!(seq, "discarding stale history response");
            return Err(PanelError::StaleHistory { seq });
        }

        let kept = rebuilt.len();
        self.entries.send_if_modified(|entries| {
            if *entries == rebuilt {
                return false;
            }
            *entries = rebuilt;
            true
        });
        Ok(kept)
    }

    /// Empty the local log. Nothing is sent to the backend.
    pub fn clear(&self) {
        self.seq.fetch_add(1, Ordering::SeqCst);
        self.entries.send_if_modified(|entries| {
            let changed = !entries.is_empty();
            entries.clear();
            changed
        });
    }
}

#[async_trait]
impl Refresh for HistoryChannel {
    fn name(&self) -> String {
        "history".into()
    }

    async fn refresh_in_background(&self) {
        if let Err(err) = self.refresh().await {
            debug!(error = %err, "history refresh failed");
        }
    }
}
