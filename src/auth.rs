//! Backend login.
//!
//! Every backend route requires a session. The gateway keeps the session
//! cookie, so one login through it authorizes every later call.

use std::fmt;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::PanelError;
use crate::gateway::{paths, Endpoint, Gateway, Method};

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Check the fields before anything is sent.
    pub fn validate(&self) -> Result<(), PanelError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(PanelError::Validation("Email is required".into()));
        }
        if !looks_like_email(email) {
            return Err(PanelError::Validation(
                "Please enter a valid email address".into(),
            ));
        }
        if self.password.is_empty() {
            return Err(PanelError::Validation("Password is required".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(PanelError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

/// `local@host.tld` with no whitespace and a single `@`.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .match_indices('.')
            .any(|(at, _)| at > 0 && at + 1 < domain.len())
}

/// The account the session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Log in and leave the session cookie with the gateway.
pub async fn login(gateway: &dyn Gateway, credentials: &Credentials) -> Result<User, PanelError> {
    credentials.validate()?;

    let body = json!({
        "email": credentials.email.trim(),
        "password": credentials.password,
    });
    let response = gateway
        .request(Endpoint::new(paths::LOGIN), Method::Post, Some(body))
        .await;
    if response.is_transport_failure() {
        return Err(PanelError::Transport);
    }

    // The login route answers with `user` on success and only `message` otherwise.
    let Some(user) = response.get("user") else {
        let message = response
            .str_field("message")
            .or_else(|| response.error())
            .unwrap_or("Login failed")
            .to_string();
        warn!(email = %credentials.email.trim(), %message, "login rejected");
        return Err(PanelError::Backend(message));
    };
    let user = User::deserialize(user)
        .map_err(|err| PanelError::UnexpectedResponse(format!("login user: {err}")))?;
    info!(email = %user.email, "logged in");
    Ok(user)
}
