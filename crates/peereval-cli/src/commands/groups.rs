use clap::Args;
use peereval_core::grouping::form_groups;
use peereval_core::Config;

use super::backend::Backend;
use super::block_on;

#[derive(Args)]
pub struct GroupsArgs {
    /// Target group size (defaults to `grouping.group_size`)
    #[arg(long)]
    size: Option<usize>,
    /// Random seed (defaults to `grouping.seed`)
    #[arg(long)]
    seed: Option<u64>,
    /// Random restarts besides the mean-balanced start
    #[arg(long)]
    restarts: Option<usize>,
}

pub fn run(args: GroupsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let backend = Backend::open(&config)?;

    let mut options = config.grouping.options();
    if let Some(seed) = args.seed {
        options.seed = seed;
    }
    if let Some(restarts) = args.restarts {
        options.restarts = restarts;
    }
    let size = args.size.unwrap_or(config.grouping.group_size as usize);

    let (students, preferences) = block_on(async {
        let students = backend.students().await?;
        let preferences = backend.preferences().await?;
        Ok::<_, Box<dyn std::error::Error>>((students, preferences))
    })??;

    let outcome = form_groups(&students, &preferences, size, options)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
