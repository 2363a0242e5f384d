use clap::Subcommand;
use peereval_core::{Config, StudentRecord};

use super::backend::Backend;
use super::block_on;

#[derive(Subcommand)]
pub enum RosterAction {
    /// List all students
    List,
    /// Add or update a student
    Add {
        /// Student id
        id: String,
        /// Full name
        name: String,
        /// Grade average
        #[arg(long, default_value_t = 0.0)]
        mean: f64,
        /// Work-study student
        #[arg(long)]
        alt: bool,
        /// Register the student as absent
        #[arg(long)]
        absent: bool,
    },
    /// Remove a student
    Remove {
        /// Student id
        id: String,
    },
    /// Mark a student present or absent
    Presence {
        /// Student id
        id: String,
        /// true or false
        #[arg(action = clap::ArgAction::Set)]
        present: bool,
    },
}

pub fn run(action: RosterAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let backend = Backend::open(&config)?;

    match action {
        RosterAction::List => {
            let students = block_on(backend.students())??;
            println!("{}", serde_json::to_string_pretty(&students)?);
        }
        RosterAction::Add {
            id,
            name,
            mean,
            alt,
            absent,
        } => {
            let student = StudentRecord::new(id, name)
                .with_mean(mean)
                .with_alt(alt)
                .with_present(!absent);
            backend.local()?.upsert_student(&student)?;
            println!("{}", serde_json::to_string_pretty(&student)?);
        }
        RosterAction::Remove { id } => {
            if !backend.local()?.remove_student(&id)? {
                return Err(format!("no student with id '{id}'").into());
            }
            println!("removed {id}");
        }
        RosterAction::Presence { id, present } => {
            if !backend.local()?.set_present(&id, present)? {
                return Err(format!("no student with id '{id}'").into());
            }
            println!("ok");
        }
    }
    Ok(())
}
