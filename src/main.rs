//! Storyboard - a terminal client for a shared story board.
//!
//! Lists the stories everyone has submitted, and lets a logged-in user
//! submit and delete their own stories and keep a list of favorites. All
//! changes are confirmed by the story service before they show up locally.
//!
//!   storyboard stories                         # all stories, newest first
//!   storyboard -u alice mine                   # stories alice submitted
//!   storyboard -u alice favorite <id>          # toggle a favorite
//!   storyboard -u alice submit -t T --url U -a A
//!   storyboard shell                           # interactive session

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{Intent, Notice, OutputFormat, SyncController, TerminalRenderer, View};
use cli::{Cli, Commands, ConfigAction, Login};
use domain::{AppConfig, AppError, NewStory, StoryId};
use infrastructure::{ensure_config_exists, load_config, save_config, HttpStoryApi};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::debug!(kind = e.kind(), "Command failed");
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> domain::Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    match &cli.command {
        Commands::Stories => {
            let controller = connect(&cli, &config)?;
            try_login(&controller, &cli).await?;
            controller.refresh().await?;
            controller.show(View::AllStories)?;
        }
        Commands::Mine => {
            let controller = connect(&cli, &config)?;
            require_login(&controller, &cli).await?;
            controller.show(View::OwnStories)?;
        }
        Commands::Favorites => {
            let controller = connect(&cli, &config)?;
            require_login(&controller, &cli).await?;
            controller.show(View::Favorites)?;
        }
        Commands::Submit { title, url, author } => {
            let controller = connect(&cli, &config)?;
            require_login(&controller, &cli).await?;
            let intent = Intent::Submit(NewStory::new(title.as_str(), url.as_str(), author.as_str()));
            announce(&controller.dispatch(intent).await?);
        }
        Commands::Delete { id } => {
            let controller = connect(&cli, &config)?;
            require_login(&controller, &cli).await?;
            announce(&controller.dispatch(Intent::Delete(StoryId::new(id.as_str()))).await?);
        }
        Commands::Favorite { id } => {
            let controller = connect(&cli, &config)?;
            require_login(&controller, &cli).await?;
            controller.refresh().await?;
            let intent = Intent::ToggleFavorite(StoryId::new(id.as_str()));
            announce(&controller.dispatch(intent).await?);
        }
        Commands::Login => {
            let controller = connect(&cli, &config)?;
            require_login(&controller, &cli).await?;
            print_token(&controller);
        }
        Commands::Signup { name } => {
            let (Some(username), Some(password)) = (&cli.auth.username, &cli.auth.password) else {
                return Err(AppError::validation("signup needs --username and --password"));
            };
            let controller = connect(&cli, &config)?;
            let intent = Intent::Signup {
                username: username.clone(),
                password: password.clone(),
                name: name.clone(),
            };
            announce(&controller.dispatch(intent).await?);
            print_token(&controller);
        }
        Commands::Shell => {
            let controller = connect(&cli, &config)?;
            try_login(&controller, &cli).await?;
            cli::shell::run_shell(&controller).await?;
        }
        Commands::Config { action } => cmd_config(&cli, config, action)?,
    }

    Ok(())
}

/// Build the controller for commands that talk to the story service.
fn connect(cli: &Cli, config: &AppConfig) -> domain::Result<SyncController> {
    let format = cli
        .output_format(config)
        .map_err(|message| AppError::Config { message })?;

    let api = Arc::new(HttpStoryApi::new(&config.api)?);
    Ok(SyncController::new(api, Arc::new(TerminalRenderer::new(format))))
}

/// Log in when credentials were supplied. Returns whether a session exists.
async fn try_login(controller: &SyncController, cli: &Cli) -> domain::Result<bool> {
    let intent = match cli.auth.login() {
        Some(Login::Password { username, password }) => Intent::Login { username, password },
        Some(Login::Token { username, token }) => Intent::Resume { username, token },
        None => return Ok(false),
    };

    let notice = controller.dispatch(intent).await?;
    tracing::info!("{notice}");
    Ok(true)
}

async fn require_login(controller: &SyncController, cli: &Cli) -> domain::Result<()> {
    if try_login(controller, cli).await? {
        Ok(())
    } else {
        Err(AppError::auth(
            "this command needs --username with --password or --token",
        ))
    }
}

fn announce(notice: &Notice) {
    println!("{} {}", "✓".green().bold(), notice);
}

fn print_token(controller: &SyncController) {
    if let Some(token) = controller.token() {
        println!("export STORYBOARD_TOKEN={}", token.expose());
    }
}

/// Config management command.
fn cmd_config(cli: &Cli, mut config: AppConfig, action: &ConfigAction) -> domain::Result<()> {
    let path: PathBuf = cli
        .config
        .clone()
        .unwrap_or_else(|| config.config_file_path());

    match action {
        ConfigAction::Init => {
            if ensure_config_exists(&path)? {
                println!("{} Created {}", "✓".green().bold(), path.display());
            } else {
                println!("Config already exists at {}", path.display());
            }
        }
        ConfigAction::Show => {
            let content = toml::to_string_pretty(&config).map_err(|e| AppError::Config {
                message: format!("Failed to serialize config: {e}"),
            })?;
            println!("{}", format!("# {}", path.display()).dimmed());
            println!("{content}");
        }
        ConfigAction::Set {
            api_url,
            timeout_secs,
            default_format,
        } => {
            if let Some(api_url) = api_url {
                config.api.base_url.clone_from(api_url);
            }
            if let Some(timeout_secs) = timeout_secs {
                config.api.timeout_secs = *timeout_secs;
            }
            if let Some(format) = default_format {
                format
                    .parse::<OutputFormat>()
                    .map_err(|message| AppError::Config { message })?;
                config.display.format.clone_from(format);
            }
            save_config(&config, &path)?;
            println!("{} Saved {}", "✓".green().bold(), path.display());
        }
    }

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
