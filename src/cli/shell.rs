//! Interactive shell.
//!
//! Keeps one session alive across many commands: each line is parsed into
//! a [`ShellCommand`], forms are collected with prompts, and intents go
//! through the controller's dispatch table.

use std::io::IsTerminal;

use colored::Colorize;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use crate::application::{Intent, SyncController, View};
use crate::domain::{AppError, NewStory, Result, StoryId};

const HELP: &str = "\
Commands:
  all | stories        show all stories
  mine                 show your stories
  favorites | favs     show your favorites
  refresh              reload stories from the service
  submit               submit a story (prompts for title, url, author)
  delete <id>          delete one of your stories
  star <id>            toggle a story in your favorites
  fav <id> | unfav <id>  add to or remove from favorites
  hide                 hide all lists
  login <username>     log in (prompts for a hidden password)
  signup <username>    create an account (prompts for password and name)
  logout               end the session
  whoami               show who is logged in
  help                 show this help
  quit | exit          leave the shell";

/// One parsed shell line.
#[derive(Clone)]
pub enum ShellCommand {
    Intent(Intent),
    SubmitForm,
    Login(String),
    Signup(String),
    WhoAmI,
    Help,
    Quit,
}

/// Parse a line. Blank lines yield `Ok(None)`.
///
/// # Errors
/// Returns a usage message for unknown commands or missing arguments.
pub fn parse_line(line: &str) -> std::result::Result<Option<ShellCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let argument = words.next().map(str::to_string);

    let require = |usage: &str| argument.clone().ok_or_else(|| format!("usage: {usage}"));

    let parsed = match command.to_lowercase().as_str() {
        "all" | "stories" => ShellCommand::Intent(Intent::Show(View::AllStories)),
        "mine" => ShellCommand::Intent(Intent::Show(View::OwnStories)),
        "favorites" | "favs" => ShellCommand::Intent(Intent::Show(View::Favorites)),
        "refresh" => ShellCommand::Intent(Intent::Refresh),
        "submit" => ShellCommand::SubmitForm,
        "delete" | "rm" => {
            ShellCommand::Intent(Intent::Delete(StoryId::new(require("delete <id>")?)))
        }
        "star" => {
            ShellCommand::Intent(Intent::ToggleFavorite(StoryId::new(require("star <id>")?)))
        }
        "fav" => ShellCommand::Intent(Intent::SetFavorite(
            StoryId::new(require("fav <id>")?),
            true,
        )),
        "unfav" => ShellCommand::Intent(Intent::SetFavorite(
            StoryId::new(require("unfav <id>")?),
            false,
        )),
        "hide" => ShellCommand::Intent(Intent::Hide),
        "login" => ShellCommand::Login(require("login <username>")?),
        "signup" => ShellCommand::Signup(require("signup <username>")?),
        "logout" => ShellCommand::Intent(Intent::Logout),
        "whoami" => ShellCommand::WhoAmI,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };

    Ok(Some(parsed))
}

struct Prompter {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompter {
    async fn prompt(label: &str) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(label.as_bytes())
            .await
            .map_err(|e| AppError::io("Failed to write prompt", e))?;
        stdout
            .flush()
            .await
            .map_err(|e| AppError::io("Failed to write prompt", e))
    }

    async fn ask(&mut self, label: &str) -> Result<Option<String>> {
        Self::prompt(label).await?;

        self.lines
            .next_line()
            .await
            .map_err(|e| AppError::io("Failed to read input", e))
    }

    async fn field(&mut self, label: &str) -> Result<String> {
        Ok(self.ask(label).await?.unwrap_or_default().trim().to_string())
    }

    /// Read a password without echoing it. Piped input is read as a plain
    /// line since there is no terminal to hide it on.
    async fn secret(&mut self, label: &str) -> Result<String> {
        if !std::io::stdin().is_terminal() {
            return self.field(label).await;
        }

        Self::prompt(label).await?;
        let secret = tokio::task::spawn_blocking(read_secret)
            .await
            .map_err(|e| AppError::Io {
                message: format!("Password reader stopped: {e}"),
                source: None,
            })?
            .map_err(|e| AppError::io("Failed to read password", e))?;
        println!();

        Ok(secret.unwrap_or_default())
    }
}

/// What one key press does to a hidden input line.
#[derive(Debug, PartialEq, Eq)]
enum SecretInput {
    Pending,
    Done,
    Cancelled,
}

fn apply_key(secret: &mut String, key: KeyEvent) -> SecretInput {
    match key.code {
        KeyCode::Enter => SecretInput::Done,
        KeyCode::Esc => SecretInput::Cancelled,
        KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            SecretInput::Cancelled
        }
        KeyCode::Char(c) => {
            secret.push(c);
            SecretInput::Pending
        }
        KeyCode::Backspace => {
            secret.pop();
            SecretInput::Pending
        }
        _ => SecretInput::Pending,
    }
}

/// Collect key presses in raw mode until Enter. `None` when cancelled.
fn read_secret() -> std::io::Result<Option<String>> {
    enable_raw_mode()?;
    let result = read_keys();
    disable_raw_mode()?;
    result
}

fn read_keys() -> std::io::Result<Option<String>> {
    let mut secret = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match apply_key(&mut secret, key) {
            SecretInput::Pending => {}
            SecretInput::Done => return Ok(Some(secret)),
            SecretInput::Cancelled => return Ok(None),
        }
    }
}

/// Run the interactive shell until `quit` or end of input.
///
/// # Errors
/// Returns error only when the terminal itself fails; command errors are
/// printed and the shell continues.
pub async fn run_shell(controller: &SyncController) -> Result<()> {
    let mut prompter = Prompter {
        lines: BufReader::new(tokio::io::stdin()).lines(),
    };

    println!("{}", "Storyboard shell - type 'help' for commands".bold());
    if let Err(e) = controller.dispatch(Intent::Refresh).await {
        report(&e);
    }
    if let Err(e) = controller.show(View::AllStories) {
        report(&e);
    }

    loop {
        let prompt = controller
            .with_session(|s| s.user().map(|u| u.username().to_string()))
            .map_or_else(|| "storyboard> ".to_string(), |name| format!("{name}@storyboard> "));

        let Some(line) = prompter.ask(&prompt).await? else {
            break;
        };

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                println!("{}", usage.yellow());
                continue;
            }
        };

        let intent = match command {
            ShellCommand::Intent(intent) => intent,
            ShellCommand::SubmitForm => Intent::Submit(NewStory::new(
                prompter.field("title: ").await?,
                prompter.field("url: ").await?,
                prompter.field("author: ").await?,
            )),
            ShellCommand::Login(username) => Intent::Login {
                username,
                password: prompter.secret("password: ").await?,
            },
            ShellCommand::Signup(username) => Intent::Signup {
                username,
                password: prompter.secret("password: ").await?,
                name: prompter.field("name: ").await?,
            },
            ShellCommand::WhoAmI => {
                let who = controller.with_session(|s| {
                    s.user().map(|u| {
                        let since = u
                            .created_at()
                            .map_or_else(String::new, |at| format!(", member since {}", at.format("%Y-%m-%d")));
                        format!(
                            "{} ({}){since} - {} stories, {} favorites, {} loaded",
                            u.username(),
                            u.name(),
                            u.own_stories().len(),
                            u.favorites().len(),
                            s.stories().len()
                        )
                    })
                });
                println!("{}", who.unwrap_or_else(|| "Not logged in".to_string()));
                continue;
            }
            ShellCommand::Help => {
                println!("{HELP}");
                continue;
            }
            ShellCommand::Quit => break,
        };

        match controller.dispatch(intent).await {
            Ok(notice) => println!("{} {}", "✓".green().bold(), notice),
            Err(e) => report(&e),
        }
    }

    Ok(())
}

fn report(err: &AppError) {
    eprintln!("{} {}", "Error:".red().bold(), err);
}
