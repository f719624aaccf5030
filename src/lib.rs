//! Control-panel connection orchestration.
//!
//! Supervises an agent process, a messaging bot and a browser-automation
//! pool through a backend HTTP API, and keeps a terminal dashboard in sync
//! with their connection state.

pub mod app;
pub mod auth;
pub mod connection;
pub mod error;
pub mod event;
pub mod gateway;
pub mod history;
pub mod monitor;
pub mod notify;
pub mod settings;
pub mod state;
pub mod ui;

pub use error::PanelError;
