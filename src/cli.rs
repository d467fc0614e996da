use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Zeno - hot-reload supervisor for compiled binaries
#[derive(Parser, Debug)]
#[command(name = "zeno")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Run 'zeno init' to scaffold a zeno.yml, then 'zeno run'.")]
pub struct Cli {
    /// Verbose output (overrides log.silent and log.main_only)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the project and hot-reload the binary on changes
    Run {
        /// Config file path (default: zeno.yml or .zeno.yml in the
        /// working directory)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Scaffold a default zeno.yml in the working directory
    Init {
        /// Overwrite an existing config without prompting
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::try_parse_from(["zeno", "run"]).unwrap();
        if let Commands::Run { config } = cli.command {
            assert_eq!(config, None);
        } else {
            panic!("Expected Run command");
        }
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_run_with_config() {
        let cli = Cli::try_parse_from(["zeno", "run", "--config", "dev.yml"]).unwrap();
        if let Commands::Run { config } = cli.command {
            assert_eq!(config, Some(PathBuf::from("dev.yml")));
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::try_parse_from(["zeno", "init"]).unwrap();
        if let Commands::Init { force } = cli.command {
            assert!(!force);
        } else {
            panic!("Expected Init command");
        }
    }

    #[test]
    fn test_cli_parse_init_force() {
        let cli = Cli::try_parse_from(["zeno", "init", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Init { force: true }));
    }

    #[test]
    fn test_cli_verbose_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["zeno", "run", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["zeno"]).is_err());
    }
}
