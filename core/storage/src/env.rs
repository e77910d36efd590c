//! Env-style secret file (`KEY=value` lines).
//!
//! Values are looked up in the file first and in the process environment
//! second. Writes upsert a single key and leave every other line alone.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;

use keyward_common::{Error, Result};

/// A value to store in the env file.
#[derive(Debug, Clone, Copy)]
pub enum EnvValue<'a> {
    /// Stored verbatim.
    Text(&'a str),
    /// Stored as standard base64.
    Bytes(&'a [u8]),
}

impl<'a> From<&'a str> for EnvValue<'a> {
    fn from(value: &'a str) -> Self {
        EnvValue::Text(value)
    }
}

impl<'a> From<&'a [u8]> for EnvValue<'a> {
    fn from(value: &'a [u8]) -> Self {
        EnvValue::Bytes(value)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for EnvValue<'a> {
    fn from(value: &'a [u8; N]) -> Self {
        EnvValue::Bytes(value)
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid env key: {:?}", key)))
    }
}

fn render_value(value: EnvValue<'_>) -> Result<String> {
    match value {
        EnvValue::Bytes(bytes) => Ok(BASE64.encode(bytes)),
        EnvValue::Text(text) => {
            if text.contains(['\n', '\r', '\'']) {
                return Err(Error::InvalidInput(
                    "Env values cannot contain newlines or single quotes".to_string(),
                ));
            }
            let plain = text
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "+/=_-.:@,".contains(c));
            if plain {
                Ok(text.to_string())
            } else {
                Ok(format!("'{}'", text))
            }
        }
    }
}

fn line_key(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    line.split_once('=').map(|(key, _)| key.trim())
}

/// Insert or replace `key` in the env file at `path`.
///
/// Creates the file if it does not exist; the file then carries the
/// filesystem's default permissions.
pub fn write_env_var<'a>(path: &Path, key: &str, value: impl Into<EnvValue<'a>>) -> Result<()> {
    validate_key(key)?;
    let rendered = render_value(value.into())?;
    let entry = format!("{}={}", key, rendered);

    let existing = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut replaced = false;
    let mut lines: Vec<String> = Vec::new();
    for line in existing.lines() {
        if line_key(line) == Some(key) {
            if !replaced {
                lines.push(entry.clone());
                replaced = true;
            }
        } else {
            lines.push(line.to_string());
        }
    }
    if !replaced {
        lines.push(entry);
    }

    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(path, contents)?;

    debug!("Set {} in {}", key, path.display());
    Ok(())
}

/// Look up `key` in the env file at `path`, then in the process
/// environment.
///
/// The file wins when both define `key`. `SALT` and `ENCRYPTION_KEY` must be
/// the exact values written at generation time; a stray variable of the same
/// name in the shell would otherwise make the vault unloadable.
///
/// # Errors
/// - `MissingSecret` if neither source defines `key`
/// - `Serialization` if the env file cannot be parsed
pub fn read_env_var(path: &Path, key: &str) -> Result<String> {
    if path.exists() {
        let entries = dotenvy::from_path_iter(path)
            .map_err(|e| Error::Serialization(format!("Invalid env file: {}", e)))?;
        for entry in entries {
            let (name, value) =
                entry.map_err(|e| Error::Serialization(format!("Invalid env file: {}", e)))?;
            if name == key {
                return Ok(value);
            }
        }
    }

    std::env::var(key).map_err(|_| Error::MissingSecret(key.to_string()))
}
