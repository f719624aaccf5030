//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

use panel_tui::gateway::{ApiResponse, Endpoint, Gateway, Method};
use panel_tui::notify::{Level, Notification, NotificationSink};

enum Reply {
    Now(ApiResponse),
    Later(oneshot::Receiver<ApiResponse>),
}

/// Gateway whose answers are queued per path ahead of time.
///
/// A path with an empty queue falls back to its standing reply, or to a
/// transport failure when it has none.
#[derive(Default)]
pub struct ScriptedGateway {
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    standing: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<(Method, String, Option<Value>)>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer the next request to `path` with `body`.
    pub fn reply(&self, path: &str, body: Value) {
        self.push(path, Reply::Now(ApiResponse::from_json(body)));
    }

    /// Hold the next request to `path` until the returned sender fires.
    pub fn defer(&self, path: &str) -> oneshot::Sender<ApiResponse> {
        let (tx, rx) = oneshot::channel();
        self.push(path, Reply::Later(rx));
        tx
    }

    /// Answer every otherwise unscripted request to `path` with `body`.
    pub fn always(&self, path: &str, body: Value) {
        self.standing.lock().unwrap().insert(path.to_string(), body);
    }

    pub fn count(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, called, _)| called == path)
            .count()
    }

    pub fn bodies(&self, path: &str) -> Vec<Option<Value>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, called, _)| called == path)
            .map(|(_, _, body)| body.clone())
            .collect()
    }

    fn push(&self, path: &str, reply: Reply) {
        self.queued
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn request(&self, endpoint: Endpoint, method: Method, body: Option<Value>) -> ApiResponse {
        let path = endpoint.path().to_string();
        self.calls.lock().unwrap().push((method, path.clone(), body));

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&path)
            .and_then(VecDeque::pop_front);
        match queued {
            Some(Reply::Now(response)) => response,
            Some(Reply::Later(rx)) => rx.await.unwrap_or_else(|_| ApiResponse::network_error()),
            None => match self.standing.lock().unwrap().get(&path) {
                Some(body) => ApiResponse::from_json(body.clone()),
                None => ApiResponse::network_error(),
            },
        }
    }
}

/// Sink that keeps everything it is handed.
#[derive(Clone, Default)]
pub struct RecordingSink {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|n| (n.level, n.message.clone()))
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn emit(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}
