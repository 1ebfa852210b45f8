use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "studylog", version, about = "Study timer and session log")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Act as this user instead of the configured profile
    #[arg(long, global = true)]
    user: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Countdown timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Subject catalog
    Subject {
        #[command(subcommand)]
        action: commands::subject::SubjectAction,
    },
    /// Lecture goals
    Lecture {
        #[command(subcommand)]
        action: commands::lecture::LectureAction,
    },
    /// Recorded sessions
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Monthly study heatmap
    Calendar {
        /// Month to show (YYYY-MM), defaults to the current month
        #[arg(long)]
        month: Option<String>,
        /// Print the heatmap as JSON instead of a grid
        #[arg(long)]
        json: bool,
    },
    /// Per-subject totals for a month
    Stats {
        /// Month to summarize (YYYY-MM), defaults to the current month
        #[arg(long)]
        month: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("STUDYLOG_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Config must stay usable when the config file itself is broken.
    let command = match cli.command {
        Commands::Config { action } => return commands::config::run(action),
        command => command,
    };
    let ctx = commands::Context::load(cli.user)?;
    match command {
        Commands::Timer { action } => commands::timer::run(action, &ctx).await,
        Commands::Subject { action } => commands::subject::run(action, &ctx).await,
        Commands::Lecture { action } => commands::lecture::run(action, &ctx).await,
        Commands::History { action } => commands::history::run(action, &ctx),
        Commands::Calendar { month, json } => commands::calendar::run(month.as_deref(), json, &ctx),
        Commands::Stats { month } => commands::stats::run(month.as_deref(), &ctx).await,
        Commands::Config { action } => commands::config::run(action),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = dispatch(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
