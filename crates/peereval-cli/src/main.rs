use clap::{Parser, Subcommand};

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "peereval", version, about = "Peer evaluation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Class roster management
    Roster {
        #[command(subcommand)]
        action: commands::roster::RosterAction,
    },
    /// Evaluation window management
    Window {
        #[command(subcommand)]
        action: commands::window::WindowAction,
    },
    /// Allocate 100 points among classmates
    Allocate(commands::allocate::AllocateArgs),
    /// Points received per student
    Results(commands::results::ResultsArgs),
    /// Form groups from submitted preferences
    Groups(commands::groups::GroupsArgs),
}

fn main() {
    logging::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action),
        Commands::Roster { action } => commands::roster::run(action),
        Commands::Window { action } => commands::window::run(action),
        Commands::Allocate(args) => commands::allocate::run(args),
        Commands::Results(args) => commands::results::run(args),
        Commands::Groups(args) => commands::groups::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
