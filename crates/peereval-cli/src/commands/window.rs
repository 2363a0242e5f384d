use chrono::{DateTime, Utc};
use clap::Subcommand;
use peereval_core::{Config, EvaluationWindow, GateDecision, WindowProvider};
use serde::Serialize;

use super::backend::Backend;
use super::block_on;

#[derive(Subcommand)]
pub enum WindowAction {
    /// Show the window and whether the form is available now
    Show,
    /// Replace the window record
    Set {
        /// Closing time (RFC 3339, e.g. 2026-05-01T18:00:00Z)
        #[arg(long)]
        closes_at: DateTime<Utc>,
        /// Leave the evaluation closed
        #[arg(long)]
        closed: bool,
        /// Lock the evaluation
        #[arg(long)]
        locked: bool,
    },
    /// Open the evaluation, keeping the closing time
    Open,
    /// Close the evaluation, keeping the closing time
    Close,
    /// Lock the evaluation
    Lock,
    /// Unlock the evaluation
    Unlock,
}

#[derive(Serialize)]
struct WindowStatus<'a> {
    #[serde(flatten)]
    window: &'a EvaluationWindow,
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

fn print_status(window: &EvaluationWindow) -> Result<(), Box<dyn std::error::Error>> {
    let reason = match window.gate(Utc::now()) {
        GateDecision::Open => None,
        GateDecision::Closed(reason) => Some(reason.as_str()),
    };
    let status = WindowStatus {
        window,
        available: reason.is_none(),
        reason,
    };
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn update(
    backend: &Backend,
    edit: impl FnOnce(&mut EvaluationWindow),
) -> Result<EvaluationWindow, Box<dyn std::error::Error>> {
    let db = backend.local()?;
    let mut window = db.window()?.ok_or("no window configured; use `window set`")?;
    edit(&mut window);
    db.set_window(&window)?;
    Ok(window)
}

pub fn run(action: WindowAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let backend = Backend::open(&config)?;

    let window = match action {
        WindowAction::Show => block_on(backend.fetch_window())??,
        WindowAction::Set {
            closes_at,
            closed,
            locked,
        } => {
            let window = EvaluationWindow::new(closes_at, !closed, locked);
            backend.local()?.set_window(&window)?;
            window
        }
        WindowAction::Open => update(&backend, |w| w.is_open = true)?,
        WindowAction::Close => update(&backend, |w| w.is_open = false)?,
        WindowAction::Lock => update(&backend, |w| w.is_locked = true)?,
        WindowAction::Unlock => update(&backend, |w| w.is_locked = false)?,
    };
    print_status(&window)
}
