use chrono::Utc;
use clap::Args;
use peereval_core::allocation::parse_points;
use peereval_core::{
    AllocationPhase, AllocationRow, Blocker, Config, FormHost, FormSession, MountState,
};
use serde::Serialize;

use super::backend::Backend;
use super::block_on;

#[derive(Args)]
pub struct AllocateArgs {
    /// Evaluating student (defaults to `user.id`)
    #[arg(long)]
    user: Option<String>,
    /// Award points to a peer, one row per flag, as PEER_ID=POINTS
    #[arg(long = "give", value_name = "PEER_ID=POINTS")]
    gives: Vec<String>,
    /// Show the resulting form without submitting
    #[arg(long)]
    dry_run: bool,
}

#[derive(Serialize)]
struct FormReport<'a> {
    user: &'a str,
    rows: &'a [AllocationRow],
    available_peers: Vec<&'a str>,
    total: f64,
    remaining: f64,
    phase: AllocationPhase,
    blockers: Vec<Blocker>,
    can_submit: bool,
    submitted: bool,
}

fn parse_give(raw: &str) -> Result<(String, Option<f64>), Box<dyn std::error::Error>> {
    let (peer, points) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PEER_ID=POINTS, got '{raw}'"))?;
    let peer = peer.trim();
    if peer.is_empty() {
        return Err(format!("missing peer id in '{raw}'").into());
    }
    Ok((peer.to_string(), parse_points(points)?))
}

fn fill(
    session: &mut FormSession,
    gives: &[(String, Option<f64>)],
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = session.engine_mut();
    for (row, (peer, points)) in gives.iter().enumerate() {
        if row >= engine.rows().len() {
            if let Some(previous) = engine.rows().last().filter(|r| !r.is_filled()) {
                let prior = previous.peer_id.as_deref().unwrap_or("?");
                return Err(format!(
                    "no row left for '{peer}': the row for '{prior}' needs positive points first"
                )
                .into());
            }
            return Err(format!(
                "no row left for '{peer}': the allocation already totals {} points",
                engine.total()
            )
            .into());
        }
        engine.set_row_peer(row, Some(peer.as_str()))?;
        engine.set_row_points(row, *points)?;
    }
    Ok(())
}

pub fn run(args: AllocateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let user = args
        .user
        .or(config.user.id.clone())
        .ok_or("no user given; pass --user or set user.id")?;
    let gives = args
        .gives
        .iter()
        .map(|g| parse_give(g))
        .collect::<Result<Vec<_>, _>>()?;
    let backend = Backend::open(&config)?;

    block_on(execute(&backend, &user, &gives, args.dry_run))?
}

async fn execute(
    backend: &Backend,
    user: &str,
    gives: &[(String, Option<f64>)],
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let now = Utc::now();
    let mut host = FormHost::new();
    match host.mount(backend, backend, user, now).await {
        MountState::Ready(_) => {}
        MountState::Hidden(reason) => {
            return Err(format!("allocation form unavailable: {}", reason.as_str()).into());
        }
        MountState::Failed(e) => return Err(e.clone().into()),
        MountState::Idle | MountState::Loading => return Err("allocation form did not load".into()),
    }

    let session = host.session_mut().ok_or("allocation form did not load")?;
    fill(session, gives)?;
    let can_submit = session.can_submit(now);

    let submitted = !dry_run;
    if submitted {
        host.submit(backend, now).await?;
    }

    let engine = host.session().ok_or("allocation form did not load")?.engine();
    let report = FormReport {
        user,
        rows: engine.rows(),
        available_peers: engine.available_peers(),
        total: engine.total(),
        remaining: engine.remaining(),
        phase: engine.phase(),
        blockers: engine.blockers(),
        can_submit,
        submitted,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
