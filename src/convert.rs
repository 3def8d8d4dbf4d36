/// The convert module owns the external transcoding boundary: a lookup table from format name
/// to conversion command template and output extension, and the invocation of that command.
///
/// Formats are plain values in a table, not a type hierarchy. Command templates contain
/// `$source` and `$dest` placeholders and are tokenized with shell-style quoting, so a template
/// may itself wrap a small shell script.
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use once_cell::sync::Lazy;
use toml::Value;
use tracing::debug;

use crate::config::Config;
use crate::errors::{RepriseExpectedError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    pub command: String,
    pub extension: String,
}

/// A `[convert.formats.<name>]` entry: overrides the built-in command and/or extension for one
/// format, or defines a format the built-in table does not know.
#[derive(Debug, Clone, Default)]
pub struct FormatOverride {
    pub command: Option<String>,
    pub extension: Option<String>,
}

impl FormatOverride {
    /// A format override is either a bare command string or a table with `command` and
    /// `extension` keys.
    pub fn from_config(name: &str, value: Value) -> std::result::Result<FormatOverride, String> {
        match value {
            Value::String(command) => Ok(FormatOverride { command: Some(command), extension: None }),
            Value::Table(mut table) => {
                let command = match table.remove("command") {
                    None => None,
                    Some(Value::String(s)) => Some(s),
                    Some(other) => return Err(format!("command must be a string: got {}", other.type_str())),
                };
                let extension = match table.remove("extension") {
                    None => None,
                    Some(Value::String(s)) => Some(s.trim_start_matches('.').to_lowercase()),
                    Some(other) => return Err(format!("extension must be a string: got {}", other.type_str())),
                };
                if let Some(key) = table.keys().next() {
                    return Err(format!("unrecognized key {key} for format {name}"));
                }
                Ok(FormatOverride { command, extension })
            }
            other => Err(format!("must be a command string or a table: got {}", other.type_str())),
        }
    }
}

static FORMATS: Lazy<HashMap<&'static str, FormatSpec>> = Lazy::new(|| {
    let mut map = HashMap::new();
    let mut insert = |name, command: &str, extension: &str| {
        map.insert(name, FormatSpec { command: command.to_string(), extension: extension.to_string() });
    };
    insert("mp3", "ffmpeg -i $source -y -vn -aq 2 $dest", "mp3");
    insert("aac", "ffmpeg -i $source -y -vn -acodec aac -aq 1 $dest", "m4a");
    insert("alac", "ffmpeg -i $source -y -vn -acodec alac $dest", "m4a");
    insert("flac", "ffmpeg -i $source -y -vn -acodec flac $dest", "flac");
    insert("opus", "ffmpeg -i $source -y -vn -acodec libopus -ab 96k $dest", "opus");
    insert("ogg", "ffmpeg -i $source -y -vn -acodec libvorbis -aq 3 $dest", "ogg");
    insert("wma", "ffmpeg -i $source -y -vn -acodec wmav2 $dest", "wma");
    insert("wav", "ffmpeg -i $source -y -vn -acodec pcm_s16le $dest", "wav");
    map
});

static ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([("m4a", "aac"), ("vorbis", "ogg"), ("windows media", "wma")])
});

/// Resolve a format name (alias-aware, case-insensitive) to its canonical name.
pub fn resolve_alias(name: &str) -> String {
    let lower = name.to_lowercase();
    match ALIASES.get(lower.as_str()) {
        Some(canonical) => canonical.to_string(),
        None => lower,
    }
}

/// Look up the conversion command and output extension for a format, applying any
/// `[convert.formats]` overrides from the configuration.
pub fn get_format(name: &str, config: &Config) -> Result<FormatSpec> {
    let canonical = resolve_alias(name);
    let builtin = FORMATS.get(canonical.as_str());
    let over = config.convert_formats.get(canonical.as_str());
    let spec = FormatSpec {
        command: over
            .and_then(|o| o.command.clone())
            .or_else(|| builtin.map(|s| s.command.clone()))
            .ok_or_else(|| RepriseExpectedError::Generic(format!("Unknown conversion format '{name}'")))?,
        extension: over
            .and_then(|o| o.extension.clone())
            .or_else(|| builtin.map(|s| s.extension.clone()))
            .unwrap_or(canonical),
    };
    Ok(spec)
}

/// Split a command template into arguments, honoring single and double quotes.
pub fn split_command(template: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    for c in template.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        args.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if in_token {
        args.push(current);
    }
    args
}

fn conversion_error(source: &Path, message: impl Into<String>) -> RepriseExpectedError {
    RepriseExpectedError::Conversion { path: source.to_path_buf(), message: message.into() }
}

/// Run the external conversion command, substituting `$source` and `$dest`.
pub fn encode(command: &str, source: &Path, dest: &Path) -> Result<()> {
    let argv: Vec<String> = split_command(command)
        .into_iter()
        .map(|arg| {
            arg.replace("$source", &source.to_string_lossy())
                .replace("$dest", &dest.to_string_lossy())
        })
        .collect();
    if argv.is_empty() {
        return Err(conversion_error(source, "empty conversion command").into());
    }

    let cmd_display = argv
        .iter()
        .map(|a| shell_escape::escape(Cow::Borrowed(a.as_str())).into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    debug!("running conversion command: {cmd_display}");

    let status = Command::new(&argv[0])
        .args(&argv[1..])
        .status()
        .map_err(|e| conversion_error(source, format!("failed to invoke {}: {e}", argv[0])))?;
    if !status.success() {
        return Err(conversion_error(source, format!("conversion command exited with {status}")).into());
    }
    Ok(())
}
