use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use editor::config::Config;
use editor::models::ResumeUpdate;
use editor::session::{AuthToken, SessionContext};
use editor::state::AppState;
use editor::store::DocumentStore;

/// One line of stdin, e.g.
/// `{"command": "update", "field": "title", "value": "Data Engineer"}`.
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Command {
    Update(ResumeUpdate),
    Save,
    HoverTemplate { template: Option<String> },
    SignIn { token: String },
    SignOut,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume editor session v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::from_config(&config).context("failed to build HTTP clients")?;
    let session = Arc::new(SessionContext::new(
        config.auth_token.clone().map(AuthToken::new),
        config.resume_id,
    ));
    let store = DocumentStore::open(&state, session).await?;
    info!(route = %store.route(), "editing {}", store.document().title);

    spawn_status_logger(&store);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let command = match serde_json::from_str::<Command>(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("ignoring malformed command: {e}");
                continue;
            }
        };
        match command {
            Command::Update(update) => store.update(update),
            Command::Save => {
                if let Err(e) = store.save().await {
                    error!("{}", e.notice().message);
                }
            }
            Command::HoverTemplate { template } => store.set_template_override(template),
            Command::SignIn { token } => store.sign_in(AuthToken::new(token)),
            Command::SignOut => store.sign_out(),
            Command::Quit => break,
        }
    }

    if let Err(e) = store.close().await {
        error!("final save failed: {}", e.notice().message);
    }
    Ok(())
}

/// Mirrors status, route and failure notices to the log, standing in for the
/// editor's status badge and toast area.
fn spawn_status_logger(store: &Arc<DocumentStore>) {
    let mut status = store.subscribe_status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            info!(?current, "save status");
        }
    });

    let mut ids = store.session().subscribe_document_id();
    tokio::spawn(async move {
        while ids.changed().await.is_ok() {
            let route = editor::session::route_for(*ids.borrow_and_update());
            info!(%route, "route updated");
        }
    });

    let mut failures = store.subscribe_failures();
    tokio::spawn(async move {
        while let Ok(failure) = failures.recv().await {
            warn!(kind = ?failure.kind, actionable = failure.notice.actionable, "{}", failure.notice.message);
        }
    });
}
