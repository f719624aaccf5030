//! panel-tui - terminal control panel
//!
//! Connects to the panel backend and shows the live connection state of the
//! agent, the messaging bot and the browser pool.

use std::fs::OpenOptions;
use std::io;
use std::sync::{Arc, Mutex};

use eyre::WrapErr;
use color_eyre::Result;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use panel_tui::app::{App, AppConfig};
use panel_tui::auth;
use panel_tui::event::EventHandler;
use panel_tui::gateway::HttpGateway;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let config = AppConfig::load().wrap_err("failed to load configuration")?;
    init_logging(&config)?;

    let gateway = HttpGateway::new(&config.backend_url)?;
    info!(backend = %gateway.base_url(), "starting panel");
    match config.credentials() {
        Some(credentials) => {
            auth::login(&gateway, &credentials)
                .await
                .wrap_err("failed to log in to the backend")?;
        }
        None => warn!("no email/password configured, backend calls will be unauthorized"),
    }
    let mut app = App::new(&config, Arc::new(gateway))?;

    setup_terminal()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    let mut events = EventHandler::new(config.tick_rate());

    let result = app.run(&mut terminal, &mut events).await;

    restore_terminal()?;
    terminal.show_cursor()?;
    result
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging(config: &AppConfig) -> Result<()> {
    let level = if config.debug_mode { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .wrap_err_with(|| format!("failed to open log file {}", config.log_file.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn setup_terminal() -> Result<()> {
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(
        io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    Ok(())
}

fn restore_terminal() -> Result<()> {
    crossterm::execute!(
        io::stdout(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture
    )?;
    crossterm::terminal::disable_raw_mode()?;
    Ok(())
}
