//! Line-oriented keyboard input.
//!
//! Each line read from stdin maps to at most one [`Command`]:
//!
//! | input | command |
//! |---|---|
//! | empty line, `space` | toggle pause |
//! | `n`, `right` | next page |
//! | `p`, `left` | previous page |
//! | `m` | open settings |
//! | `s key=value ...` | commit settings |
//! | `c` | cancel settings |
//! | `r` | force refresh |
//! | `q`, `esc` | exit |

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wxstar_core::SettingsUpdate;
use wxstar_display::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    UnknownKey(String),
    BadSetting(String),
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::UnknownKey(key) => write!(f, "Unknown key '{}'", key),
            InputError::BadSetting(s) => write!(f, "Cannot parse setting '{}'", s),
        }
    }
}

impl std::error::Error for InputError {}

pub fn parse_line(line: &str) -> Result<Command, InputError> {
    let trimmed = line.trim();
    let (key, rest) = trimmed
        .split_once(char::is_whitespace)
        .map_or((trimmed, ""), |(k, r)| (k, r.trim()));

    match key.to_ascii_lowercase().as_str() {
        "" | "space" => Ok(Command::TogglePause),
        "n" | "right" => Ok(Command::NavigateNext),
        "p" | "left" => Ok(Command::NavigatePrevious),
        "m" => Ok(Command::OpenSettings),
        "s" => parse_update(rest).map(Command::CommitSettings),
        "c" => Ok(Command::CancelSettings),
        "r" => Ok(Command::ForceRefresh),
        "q" | "esc" => Ok(Command::Exit),
        other => Err(InputError::UnknownKey(other.to_string())),
    }
}

/// Parse `key=value` pairs into an unvalidated update. Range and enum
/// checks happen in the settings controller.
fn parse_update(raw: &str) -> Result<SettingsUpdate, InputError> {
    let mut update = SettingsUpdate::default();
    for pair in raw.split_whitespace() {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| InputError::BadSetting(pair.to_string()))?;
        let bad = || InputError::BadSetting(pair.to_string());
        let flag = |v: &str| match v {
            "on" | "true" | "1" => Ok(true),
            "off" | "false" | "0" => Ok(false),
            _ => Err(bad()),
        };

        match key {
            "marine" => update.marine_forecast_enabled = Some(flag(value)?),
            "trends" => update.trends_enabled = Some(flag(value)?),
            "historical" => update.historical_enabled = Some(flag(value)?),
            "volume" => update.volume = Some(value.parse().map_err(|_| bad())?),
            "news" => {
                update.news_sources = Some(
                    value
                        .split(',')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                )
            }
            "provider" => update.provider_preference = Some(value.to_string()),
            "theme" => update.theme = Some(value.to_string()),
            _ => return Err(bad()),
        }
    }
    Ok(update)
}

/// Read stdin until EOF or cancellation, forwarding parsed commands.
pub async fn read_commands(tx: mpsc::UnboundedSender<Command>, token: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = token.cancelled() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => match parse_line(&line) {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("{}", e),
            },
            Ok(None) => {
                tracing::debug!("stdin closed");
                break;
            }
            Err(e) => {
                tracing::warn!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
}
