use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "prepmitra")]
#[command(author, version, about = "Telegram bot for timed daily practice tests", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot in normal mode
    Run {
        /// Use webhook mode instead of long polling
        #[arg(long)]
        webhook: bool,
    },

    /// Run the retention sweep once and exit (no notifications)
    Maintenance {
        /// Only show what would be purged without deleting anything
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_webhook() {
        let cli = Cli::parse_from(["prepmitra", "run", "--webhook"]);
        assert!(matches!(cli.command, Some(Commands::Run { webhook: true })));
    }

    #[test]
    fn parses_maintenance_dry_run() {
        let cli = Cli::parse_from(["prepmitra", "maintenance", "--dry-run"]);
        assert!(matches!(cli.command, Some(Commands::Maintenance { dry_run: true })));
    }

    #[test]
    fn no_subcommand_defaults_to_none() {
        let cli = Cli::parse_from(["prepmitra"]);
        assert!(cli.command.is_none());
    }
}
