//! Interactive choices the publish pipeline needs from the user
//!
//! The pipeline only consumes resolved answers through [`Prompter`];
//! [`TerminalPrompter`] is the stdin/stdout implementation used by the CLI.

use anyhow::{anyhow, bail, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use semver::Version;
use std::io::{self, BufRead, IsTerminal, Write};

use crate::provider::{Organization, ProviderKind};
use crate::store::OwnerMode;
use crate::version::Increment;

pub trait Prompter: Send + Sync {
    fn select_provider(&self) -> Result<ProviderKind>;

    fn input_token(&self, kind: ProviderKind) -> Result<String>;

    /// `allow_organization` is false when the user belongs to no organization
    fn select_owner_mode(&self, allow_organization: bool) -> Result<OwnerMode>;

    /// Returns the login of the chosen organization
    fn select_organization(&self, orgs: &[Organization]) -> Result<String>;

    fn select_increment(&self, latest_release: &Version) -> Result<Increment>;

    /// May return an empty string; callers decide whether to ask again
    fn input_commit_message(&self) -> Result<String>;
}

/// Numbered-list prompts on the terminal
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }

    fn read_line(prompt: &str) -> Result<String> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut input = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut input)
            .context("Failed to read from stdin")?;
        if read == 0 {
            return Err(anyhow!("stdin closed while waiting for input"));
        }
        Ok(input.trim().to_string())
    }

    /// Read a line without echoing it; falls back to a plain read when stdin is piped
    fn read_secret(prompt: &str) -> Result<String> {
        if !io::stdin().is_terminal() {
            return Self::read_line(prompt);
        }

        print!("{}", prompt);
        io::stdout().flush()?;

        terminal::enable_raw_mode().context("Failed to switch terminal to raw mode")?;
        let secret = Self::read_masked();
        terminal::disable_raw_mode().context("Failed to restore terminal mode")?;
        println!();

        secret
    }

    fn read_masked() -> Result<String> {
        let mut secret = String::new();
        loop {
            let Event::Key(KeyEvent {
                code,
                modifiers,
                kind,
                ..
            }) = event::read().context("Failed to read key")?
            else {
                continue;
            };
            if kind == KeyEventKind::Release {
                continue;
            }
            match code {
                KeyCode::Enter => return Ok(secret.trim().to_string()),
                KeyCode::Backspace => {
                    secret.pop();
                }
                KeyCode::Char('c') | KeyCode::Char('d')
                    if modifiers.contains(KeyModifiers::CONTROL) =>
                {
                    bail!("Token entry cancelled");
                }
                KeyCode::Char(c) => secret.push(c),
                _ => {}
            }
        }
    }

    /// Display options and return the chosen 0-based index; Enter picks the first
    fn choose(title: &str, options: &[String]) -> Result<usize> {
        if options.is_empty() {
            return Err(anyhow!("Nothing to choose from for: {}", title));
        }

        println!("\n\x1b[1m{}\x1b[0m", title);
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {}", i + 1, option);
        }

        loop {
            let selection =
                Self::read_line(&format!("Select (1-{}) [default: 1]: ", options.len()))?;
            if selection.is_empty() {
                return Ok(0);
            }
            match selection.parse::<usize>() {
                Ok(index) if index > 0 && index <= options.len() => return Ok(index - 1),
                _ => println!("Invalid selection: {}", selection),
            }
        }
    }
}

impl Prompter for TerminalPrompter {
    fn select_provider(&self) -> Result<ProviderKind> {
        let options: Vec<String> = ProviderKind::ALL
            .iter()
            .map(|kind| kind.display_name().to_string())
            .collect();
        let index = Self::choose("Choose the git hosting provider", &options)?;
        Ok(ProviderKind::ALL[index])
    }

    fn input_token(&self, kind: ProviderKind) -> Result<String> {
        Self::read_secret(&format!("Paste your {} access token: ", kind))
    }

    fn select_owner_mode(&self, allow_organization: bool) -> Result<OwnerMode> {
        let mut modes = vec![OwnerMode::Personal];
        if allow_organization {
            modes.push(OwnerMode::Organization);
        }
        let options: Vec<String> = modes
            .iter()
            .map(|mode| match mode {
                OwnerMode::Personal => "Personal account".to_string(),
                OwnerMode::Organization => "Organization".to_string(),
            })
            .collect();
        let index = Self::choose("Who should own the remote repository?", &options)?;
        Ok(modes[index])
    }

    fn select_organization(&self, orgs: &[Organization]) -> Result<String> {
        let options: Vec<String> = orgs.iter().map(|org| org.login.clone()).collect();
        let index = Self::choose("Choose the organization", &options)?;
        Ok(options[index].clone())
    }

    fn select_increment(&self, latest_release: &Version) -> Result<Increment> {
        let options: Vec<String> = Increment::ALL
            .iter()
            .map(|inc| format!("{} ({})", inc, inc.apply(latest_release)))
            .collect();
        let title = format!(
            "Release {} already exists, choose the next version",
            latest_release
        );
        let index = Self::choose(&title, &options)?;
        Ok(Increment::ALL[index])
    }

    fn input_commit_message(&self) -> Result<String> {
        Self::read_line("Commit message: ")
    }
}
