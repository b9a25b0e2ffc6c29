// src/utils/prompt.rs
use crate::error::{KubiError, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io::{self, BufRead, IsTerminal, Write};

/// Reads a secret without echoing it.
///
/// On a terminal the line is read in raw mode; when stdin is piped the first
/// line is taken as-is.
pub fn read_password(prompt: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(prompt_failed)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    let mut stderr = io::stderr();
    write!(stderr, "{}", prompt)
        .and_then(|_| stderr.flush())
        .map_err(prompt_failed)?;

    enable_raw_mode().map_err(prompt_failed)?;
    let result = read_hidden_line();
    let restored = disable_raw_mode();
    let _ = writeln!(stderr);

    restored.map_err(prompt_failed)?;
    result
}

fn read_hidden_line() -> Result<String> {
    let mut secret = String::new();
    loop {
        if let Event::Key(key) = event::read().map_err(prompt_failed)? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => return Ok(secret),
                KeyCode::Esc => return Err(aborted()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Err(aborted())
                }
                KeyCode::Char(c) => secret.push(c),
                KeyCode::Backspace => {
                    secret.pop();
                }
                _ => {}
            }
        }
    }
}

fn aborted() -> KubiError {
    KubiError::ValidationFailed("password entry aborted".to_string())
}

fn prompt_failed(e: io::Error) -> KubiError {
    KubiError::ValidationFailed(format!("could not read password: {}", e))
}
