//! Per-service parameters: endpoints, connect-time validation and status
//! interpretation.

use std::fmt;

use reqwest::Url;
use serde::Serialize;
use serde_json::{Map, Value};

use super::ServiceId;
use crate::error::PanelError;
use crate::gateway::{paths, ApiResponse, Endpoint, Method};

/// One backend call: method plus path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: &'static str,
}

impl Route {
    pub const fn get(path: &'static str) -> Self {
        Self { method: Method::Get, path }
    }

    pub const fn post(path: &'static str) -> Self {
        Self { method: Method::Post, path }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.path)
    }
}

/// How the bot receives updates from the messaging platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    #[default]
    Polling,
    Webhook,
}

impl UpdateMethod {
    pub fn toggled(self) -> Self {
        match self {
            UpdateMethod::Polling => UpdateMethod::Webhook,
            UpdateMethod::Webhook => UpdateMethod::Polling,
        }
    }
}

impl fmt::Display for UpdateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateMethod::Polling => write!(f, "polling"),
            UpdateMethod::Webhook => write!(f, "webhook"),
        }
    }
}

/// Connect-time input for the messaging bot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BotLink {
    pub bot_token: String,
    pub chat_id: String,
    pub webhook_url: Option<String>,
    pub update_method: UpdateMethod,
}

/// Supported browser-automation pool vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    #[default]
    Octo,
    Undetectable,
    Vision,
    Linken,
}

impl PoolKind {
    pub const ALL: [PoolKind; 4] = [
        PoolKind::Octo,
        PoolKind::Undetectable,
        PoolKind::Vision,
        PoolKind::Linken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Octo => "octo",
            PoolKind::Undetectable => "undetectable",
            PoolKind::Vision => "vision",
            PoolKind::Linken => "linken",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PoolKind::Octo => "Octo Browser",
            PoolKind::Undetectable => "Undetectable",
            PoolKind::Vision => "Vision Browser",
            PoolKind::Linken => "Linken Sphere",
        }
    }

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|kind| *kind == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

/// Where the browser pool lives.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PoolTarget {
    pub api_url: String,
    #[serde(rename = "type")]
    pub kind: PoolKind,
}

impl PoolTarget {
    pub fn new(api_url: impl Into<String>, kind: PoolKind) -> Self {
        Self {
            api_url: api_url.into(),
            kind,
        }
    }

    pub(crate) fn validated(&self) -> Result<PoolTarget, PanelError> {
        let api_url = self.api_url.trim();
        if api_url.is_empty() {
            return Err(PanelError::Validation("Please enter API URL".into()));
        }
        Url::parse(api_url)
            .map_err(|err| PanelError::Validation(format!("Invalid API URL: {err}")))?;
        Ok(PoolTarget::new(api_url, self.kind))
    }
}

/// Input handed to [`ConnectionMachine::connect`](super::ConnectionMachine::connect).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectPayload {
    None,
    Bot(BotLink),
    BrowserPool(PoolTarget),
}

impl ConnectPayload {
    fn kind(&self) -> &'static str {
        match self {
            ConnectPayload::None => "empty",
            ConnectPayload::Bot(_) => "bot",
            ConnectPayload::BrowserPool(_) => "browser pool",
        }
    }
}

type Validator = fn(&ConnectPayload) -> Result<Option<Value>, PanelError>;
type StatusReader = fn(&ApiResponse) -> Result<bool, PanelError>;

/// Everything that distinguishes one service's machine from another.
#[derive(Clone)]
pub struct ServiceSpec {
    pub id: ServiceId,
    pub status: Route,
    pub connect: Route,
    pub disconnect: Route,
    validate: Validator,
    read_status: StatusReader,
}

impl fmt::Debug for ServiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSpec")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("connect", &self.connect)
            .field("disconnect", &self.disconnect)
            .finish()
    }
}

impl ServiceSpec {
    pub fn agent() -> Self {
        Self {
            id: ServiceId::Agent,
            status: Route::get(paths::AGENT_STATUS),
            connect: Route::post(paths::AGENT_START),
            disconnect: Route::post(paths::AGENT_STOP),
            validate: validate_agent,
            read_status: read_agent_status,
        }
    }

    pub fn bot() -> Self {
        Self {
            id: ServiceId::Bot,
            status: Route::get(paths::TELEGRAM_STATUS),
            connect: Route::post(paths::TELEGRAM_CONNECT),
            disconnect: Route::post(paths::TELEGRAM_DISCONNECT),
            validate: validate_bot,
            read_status: read_bot_status,
        }
    }

    pub fn browser_pool() -> Self {
        Self {
            id: ServiceId::BrowserPool,
            status: Route::get(paths::BROWSER_STATUS),
            connect: Route::post(paths::BROWSER_CONNECT),
            disconnect: Route::post(paths::BROWSER_DISCONNECT),
            validate: validate_pool,
            read_status: read_pool_status,
        }
    }

    pub fn for_service(id: ServiceId) -> Self {
        match id {
            ServiceId::Agent => Self::agent(),
            ServiceId::Bot => Self::bot(),
            ServiceId::BrowserPool => Self::browser_pool(),
        }
    }

    /// Validate connect input and build the request body.
    pub fn validate(&self, payload: &ConnectPayload) -> Result<Option<Value>, PanelError> {
        (self.validate)(payload)
    }

    /// Interpret a status response: `Ok(true)` connected, `Ok(false)` not.
    pub fn read_status(&self, response: &ApiResponse) -> Result<bool, PanelError> {
        (self.read_status)(response)
    }
}

fn wrong_payload(service: ServiceId, payload: &ConnectPayload) -> PanelError {
    PanelError::Validation(format!(
        "{} does not accept {} connection details",
        service.label(),
        payload.kind()
    ))
}

fn to_body<T: Serialize>(value: &T) -> Result<Option<Value>, PanelError> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|err| PanelError::Validation(err.to_string()))
}

fn validate_agent(payload: &ConnectPayload) -> Result<Option<Value>, PanelError> {
    match payload {
        ConnectPayload::None => Ok(None),
        other => Err(wrong_payload(ServiceId::Agent, other)),
    }
}

fn validate_bot(payload: &ConnectPayload) -> Result<Option<Value>, PanelError> {
    let ConnectPayload::Bot(link) = payload else {
        return Err(wrong_payload(ServiceId::Bot, payload));
    };

    let bot_token = link.bot_token.trim();
    let chat_id = link.chat_id.trim();
    if bot_token.is_empty() || chat_id.is_empty() {
        return Err(PanelError::Validation("Please fill all required fields".into()));
    }

    let webhook_url = link
        .webhook_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());
    if link.update_method == UpdateMethod::Webhook {
        let Some(url) = webhook_url else {
            return Err(PanelError::Validation(
                "Webhook URL is required for webhook updates".into(),
            ));
        };
        Url::parse(url)
            .map_err(|err| PanelError::Validation(format!("Invalid webhook URL: {err}")))?;
    }

    to_body(&BotLink {
        bot_token: bot_token.to_string(),
        chat_id: chat_id.to_string(),
        webhook_url: webhook_url.map(str::to_string),
        update_method: link.update_method,
    })
}

fn validate_pool(payload: &ConnectPayload) -> Result<Option<Value>, PanelError> {
    let ConnectPayload::BrowserPool(target) = payload else {
        return Err(wrong_payload(ServiceId::BrowserPool, payload));
    };
    to_body(&target.validated()?)
}

fn read_agent_status(response: &ApiResponse) -> Result<bool, PanelError> {
    if !response.is_success() {
        return Err(PanelError::Backend(
            response.error().unwrap_or("Agent status unavailable").to_string(),
        ));
    }
    match response.str_field("status") {
        Some("online") => Ok(true),
        Some("offline") => Ok(false),
        Some(other) => Err(PanelError::UnexpectedResponse(format!(
            "unknown agent status {other:?}"
        ))),
        None => Err(PanelError::UnexpectedResponse("agent status missing".into())),
    }
}

fn read_bot_status(response: &ApiResponse) -> Result<bool, PanelError> {
    if !response.is_success() {
        return Err(PanelError::Backend(
            response.error().unwrap_or("Not connected").to_string(),
        ));
    }
    match response.str_field("status") {
        Some(status) => Ok(status == "connected"),
        None => Err(PanelError::UnexpectedResponse("bot status missing".into())),
    }
}

fn read_pool_status(response: &ApiResponse) -> Result<bool, PanelError> {
    if let Some(connected) = response.get("connected").and_then(Value::as_bool) {
        return Ok(connected);
    }
    if !response.is_success() {
        return Err(PanelError::Backend(
            response
                .error()
                .unwrap_or("Browser pool status unavailable")
                .to_string(),
        ));
    }
    Err(PanelError::UnexpectedResponse(
        "browser pool status missing `connected`".into(),
    ))
}

/// Identity fields of a connect or status response, minus the envelope.
pub(crate) fn credentials_from(response: &ApiResponse) -> Option<Value> {
    let object = response.body().as_object()?;
    let identity: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "success" | "message" | "error" | "status" | "connected"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    (!identity.is_empty()).then_some(Value::Object(identity))
}
