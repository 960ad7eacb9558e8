use std::fmt;
use std::io::{self, BufRead, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::error::HlsError;

pub const USERNAME_ENV: &str = "EARTHDATA_USERNAME";
pub const PASSWORD_ENV: &str = "EARTHDATA_PASSWORD";
const SIGNUP_URL: &str = "https://urs.earthdata.nasa.gov/users/new";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of Earthdata login credentials. The HTTP clients only ever see
/// the resulting [`Credentials`].
pub trait CredentialProvider {
    fn credentials(&self) -> Result<Credentials, HlsError>;
}

pub struct StaticCredentials(pub Credentials);

impl CredentialProvider for StaticCredentials {
    fn credentials(&self) -> Result<Credentials, HlsError> {
        Ok(self.0.clone())
    }
}

pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn credentials(&self) -> Result<Credentials, HlsError> {
        let username = non_empty_env(USERNAME_ENV)
            .ok_or_else(|| HlsError::MissingCredentials(format!("{USERNAME_ENV} not set")))?;
        let password = non_empty_env(PASSWORD_ENV)
            .ok_or_else(|| HlsError::MissingCredentials(format!("{PASSWORD_ENV} not set")))?;
        Ok(Credentials { username, password })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Asks on the terminal for whatever the environment did not provide.
pub struct PromptCredentials;

impl CredentialProvider for PromptCredentials {
    fn credentials(&self) -> Result<Credentials, HlsError> {
        let mut stderr = io::stderr();
        let prompt_err = |err: io::Error| HlsError::CredentialPrompt(err.to_string());

        let username = match non_empty_env(USERNAME_ENV) {
            Some(username) => username,
            None => {
                writeln!(stderr, "Enter your NASA Earthdata credentials:").map_err(prompt_err)?;
                writeln!(stderr, "(Sign up at: {SIGNUP_URL})").map_err(prompt_err)?;
                write!(stderr, "Username: ").map_err(prompt_err)?;
                stderr.flush().map_err(prompt_err)?;
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line).map_err(prompt_err)?;
                line.trim().to_string()
            }
        };
        if username.is_empty() {
            return Err(HlsError::MissingCredentials("empty username".to_string()));
        }

        let password = match non_empty_env(PASSWORD_ENV) {
            Some(password) => password,
            None => {
                write!(stderr, "Password: ").map_err(prompt_err)?;
                stderr.flush().map_err(prompt_err)?;
                read_hidden_line()?
            }
        };
        if password.is_empty() {
            return Err(HlsError::MissingCredentials("empty password".to_string()));
        }

        Ok(Credentials { username, password })
    }
}

fn read_hidden_line() -> Result<String, HlsError> {
    enable_raw_mode().map_err(|err| HlsError::CredentialPrompt(err.to_string()))?;
    let result = read_keys_until_enter();
    let _ = disable_raw_mode();
    eprintln!();
    result
}

fn read_keys_until_enter() -> Result<String, HlsError> {
    let mut value = String::new();
    loop {
        let Event::Key(key) =
            event::read().map_err(|err| HlsError::CredentialPrompt(err.to_string()))?
        else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(value),
            KeyCode::Backspace => {
                value.pop();
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(HlsError::CredentialPrompt("interrupted".to_string()));
            }
            KeyCode::Esc => {
                return Err(HlsError::CredentialPrompt("cancelled".to_string()));
            }
            KeyCode::Char(ch) => value.push(ch),
            _ => {}
        }
    }
}

/// Tries each provider in order and returns the first success. When all
/// fail, the last error wins.
pub struct ChainedCredentials {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ChainedCredentials {
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }

    pub fn for_mode(interactive: bool) -> Self {
        let mut providers: Vec<Box<dyn CredentialProvider>> = vec![Box::new(EnvCredentials)];
        if interactive {
            providers.push(Box::new(PromptCredentials));
        }
        Self::new(providers)
    }
}

impl CredentialProvider for ChainedCredentials {
    fn credentials(&self) -> Result<Credentials, HlsError> {
        let mut last_error =
            HlsError::MissingCredentials("no credential source configured".to_string());
        for provider in &self.providers {
            match provider.credentials() {
                Ok(credentials) => return Ok(credentials),
                Err(err) => {
                    tracing::debug!(error = %err, "credential source unavailable");
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }
}
