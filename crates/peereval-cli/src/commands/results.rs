use clap::Args;
use peereval_core::results::{aggregate, progress, Progress, StudentResult};
use peereval_core::Config;
use serde::Serialize;

use super::backend::Backend;
use super::block_on;

#[derive(Args)]
pub struct ResultsArgs {
    /// Only report submission progress
    #[arg(long)]
    progress: bool,
}

#[derive(Serialize)]
struct ResultsReport {
    progress: Progress,
    #[serde(skip_serializing_if = "Option::is_none")]
    students: Option<Vec<StudentResult>>,
}

pub fn run(args: ResultsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let backend = Backend::open(&config)?;

    let (students, preferences) = block_on(async {
        let students = backend.students().await?;
        let preferences = backend.preferences().await?;
        Ok::<_, Box<dyn std::error::Error>>((students, preferences))
    })??;

    let report = ResultsReport {
        progress: progress(&students, &preferences),
        students: (!args.progress).then(|| aggregate(&students, &preferences)),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
