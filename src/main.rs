use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::Path;
use voxrelay::app::{ServeOverrides, apply_overrides, serve};
use voxrelay::cli::{Cli, Commands, ConfigAction};
use voxrelay::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    voxrelay::logging::init(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Serve {
            bind,
            request_timeout,
            no_auth,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let overrides = ServeOverrides {
                bind,
                request_timeout_secs: request_timeout,
                no_auth,
            };
            serve(apply_overrides(config, &overrides)).await?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "voxrelay",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/voxrelay/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let config_path = custom_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            let rendered = config.to_toml()?;
            if std::io::stdout().is_terminal() {
                println!("{}", format!("# {}", config_path.display()).dimmed());
            }
            print!("{}", rendered);
        }
    }
    Ok(())
}
