use clap::{Args, Subcommand};

use crate::commands::CliError;
use crate::config;

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ConfigSubcommand {
    /// Parse the config file and validate its profiles
    Check {
        /// Only validate this profile
        #[arg(long)]
        profile: Option<String>,
    },
    /// Print where the config file is looked up
    Path,
}

pub fn run(args: ConfigArgs) -> Result<(), CliError> {
    match args.command {
        ConfigSubcommand::Check { profile } => {
            let path = config::validate_config(profile.as_deref())?;
            match profile {
                Some(name) => println!("config OK: {} (profile '{name}')", path.display()),
                None => println!("config OK: {}", path.display()),
            }
        }
        ConfigSubcommand::Path => println!("{}", config::config_path()?.display()),
    }
    Ok(())
}
