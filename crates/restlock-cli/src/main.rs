use clap::{Parser, Subcommand};

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "restlock", version, about = "Rest & Lock break enforcer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write default settings on first run and schedule the first break
    Install,
    /// Enable breaks
    Start,
    /// Disable breaks (a running lock still ends on time)
    Stop,
    /// Schedule the next break one interval from now
    Reschedule,
    /// Change break settings
    Configure {
        /// Minutes of work between breaks
        #[arg(long, allow_negative_numbers = true)]
        interval: Option<i64>,
        /// Minutes each break lasts
        #[arg(long, allow_negative_numbers = true)]
        duration: Option<i64>,
    },
    /// Print the current phase and timers as JSON
    Status,
    /// Deliver every alarm that is due
    Tick,
    /// Deliver alarms continuously until interrupted
    Daemon {
        /// Polling interval in milliseconds (defaults to the config value)
        #[arg(long)]
        poll_ms: Option<u64>,
    },
    /// Local surface registry
    Surface {
        #[command(subcommand)]
        action: commands::surface::SurfaceAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init();

    let result = match cli.command {
        Commands::Install => commands::cycle::install(),
        Commands::Start => commands::cycle::control(restlock_core::Command::Start),
        Commands::Stop => commands::cycle::control(restlock_core::Command::Stop),
        Commands::Reschedule => commands::cycle::control(restlock_core::Command::Reschedule),
        Commands::Configure { interval, duration } => {
            commands::cycle::control(restlock_core::Command::Configure {
                work_interval_minutes: interval,
                break_duration_minutes: duration,
            })
        }
        Commands::Status => commands::cycle::status(),
        Commands::Tick => commands::cycle::tick(),
        Commands::Daemon { poll_ms } => commands::daemon::run(poll_ms),
        Commands::Surface { action } => commands::surface::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
