mod actions;
mod api;
mod app;
mod board;
mod config;
mod drag;
mod error;
mod models;
mod notify;
mod parser;
mod ui;

use api::ApiClient;
use app::App;
use config::Config;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use notify::Notifier;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::{self, OpenOptions};
use std::io;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// The terminal belongs to the UI, so logs go to a file.
fn init_logging(config: &Config) {
    let Some(path) = config.log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::load()?;
    init_logging(&config);
    info!(base_url = %config.base_url, "starting");

    let api = ApiClient::new(&config)?;
    let mut app = App::new(api.clone(), &config);

    // `--register` creates the configured account before signing in.
    let register = std::env::args().skip(1).any(|arg| arg == "--register");

    let mut logged_in = false;
    if let Some(credentials) = config.credentials() {
        if register {
            actions::register(&api, &mut app.toasts, &credentials).await;
        }
        logged_in = actions::login(&api, &mut app.toasts, &credentials).await;
    } else if register {
        app.toasts.notify(
            "--register needs an email and password in the config or environment".to_string(),
            notify::Level::Warning,
        );
    }
    match api.me().await {
        Ok(profile) => info!(%profile, "session active"),
        Err(err) => app
            .toasts
            .notify(format!("Not signed in: {}", err), notify::Level::Warning),
    }

    app.load_boards(config.default_board).await;

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let res = ui::run_app(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    match res {
        Ok(mut app) => {
            if logged_in {
                actions::logout(&api, &mut app.toasts).await;
            }
        }
        Err(err) => {
            error!(error = %err, "ui loop failed");
            eprintln!("Error: {:?}", err);
        }
    }

    Ok(())
}
