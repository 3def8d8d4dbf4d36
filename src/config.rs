/// The config module provides the config spec and parsing logic.
///
/// We take special care with the configuration experience: invalid configurations produce
/// detailed errors naming the offending key and file, and unrecognized keys produce warnings.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use toml::value::{Table, Value};
use tracing::warn;

use crate::convert::FormatOverride;
use crate::errors::{RepriseError, RepriseExpectedError, Result};
use crate::templates::PathTemplateConfig;

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "reprise").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// One collection ("alternative") definition, as configured. Validation beyond field types,
/// such as the required name and query compilation, happens when the collection is built for a
/// pass, so that a broken definition skips only itself.
#[derive(Debug, Clone)]
pub struct AlternativeConfig {
    pub name: Option<String>,
    pub directory: Option<String>,
    pub query: Vec<String>,
    pub album_query: Vec<String>,
    /// Accepted formats, lowercased. Empty = copy only; the single entry "link" = symlink view.
    pub formats: Vec<String>,
    /// Per-collection path templates; when non-empty this replaces the global table entirely.
    pub paths: Vec<(String, String)>,
    pub removable: bool,
}

impl Default for AlternativeConfig {
    fn default() -> AlternativeConfig {
        AlternativeConfig {
            name: None,
            directory: None,
            query: Vec::new(),
            album_query: Vec::new(),
            formats: Vec::new(),
            paths: Vec::new(),
            removable: true,
        }
    }
}

#[derive(Debug)]
pub struct Config {
    /// Root of the primary library; also the base for a relative `alt_dir`.
    pub library_dir: PathBuf,
    pub database_path: PathBuf,
    /// Base directory for relative collection roots.
    pub alt_dir: PathBuf,
    /// Reserved: automatic sync on library change events. Parsed, not acted upon.
    pub auto: bool,
    /// Bound on the conversion worker pool.
    pub max_workers: usize,
    pub path_templates: PathTemplateConfig,
    /// Embed album art into files produced by convert-mode add jobs.
    pub convert_embed: bool,
    pub convert_formats: HashMap<String, FormatOverride>,
    pub alternatives: Vec<AlternativeConfig>,
}

fn missing_key(key: &str, cfgpath: &Path) -> RepriseError {
    RepriseExpectedError::MissingConfigKey { key: key.to_string(), path: cfgpath.to_path_buf() }.into()
}

fn invalid_value(key: &str, cfgpath: &Path, message: impl Into<String>) -> RepriseError {
    RepriseExpectedError::InvalidConfigValue {
        key: key.to_string(),
        path: cfgpath.to_path_buf(),
        message: message.into(),
    }
    .into()
}

fn take_str(table: &mut Table, key: &str, cfgpath: &Path) -> Result<Option<String>> {
    match table.remove(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(invalid_value(key, cfgpath, format!("must be a string: got {}", other.type_str()))),
    }
}

fn take_bool(table: &mut Table, key: &str, cfgpath: &Path) -> Result<Option<bool>> {
    match table.remove(key) {
        None => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(b)),
        Some(other) => Err(invalid_value(key, cfgpath, format!("must be a boolean: got {}", other.type_str()))),
    }
}

fn take_path(table: &mut Table, key: &str, cfgpath: &Path) -> Result<Option<PathBuf>> {
    Ok(take_str(table, key, cfgpath)?.map(|s| PathBuf::from(shellexpand::tilde(&s).into_owned())))
}

/// A query option is a single string or a list of strings.
fn take_queries(table: &mut Table, key: &str, cfgpath: &Path) -> Result<Vec<String>> {
    match table.remove(key) {
        None => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s]),
        Some(Value::Array(values)) => {
            let mut queries = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    Value::String(s) => queries.push(s),
                    other => {
                        return Err(invalid_value(key, cfgpath, format!("each query must be a string: got {}", other.type_str())))
                    }
                }
            }
            Ok(queries)
        }
        Some(other) => Err(invalid_value(
            key,
            cfgpath,
            format!("must be a string or a list of strings: got {}", other.type_str()),
        )),
    }
}

fn take_template_pairs(table: &mut Table, key: &str, cfgpath: &Path) -> Result<Vec<(String, String)>> {
    match table.remove(key) {
        None => Ok(Vec::new()),
        Some(Value::Table(entries)) => {
            let mut pairs = Vec::with_capacity(entries.len());
            for (query, template) in entries {
                match template {
                    Value::String(template) => pairs.push((query, template)),
                    other => {
                        return Err(invalid_value(
                            &format!("{key}.{query}"),
                            cfgpath,
                            format!("must be a template string: got {}", other.type_str()),
                        ))
                    }
                }
            }
            Ok(pairs)
        }
        Some(other) => Err(invalid_value(key, cfgpath, format!("must be a table: got {}", other.type_str()))),
    }
}

fn warn_unused(table: &Table, context: &str) {
    for key in table.keys() {
        warn!("unrecognized configuration key {key} in {context}");
    }
}

impl Config {
    pub fn parse(config_path_override: Option<&Path>) -> Result<Config> {
        let cfgpath = match config_path_override {
            Some(p) => p.to_path_buf(),
            None => default_config_path()
                .ok_or_else(|| RepriseError::Generic("failed to determine the configuration directory".to_string()))?,
        };

        let cfgtext = match fs::read_to_string(&cfgpath) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepriseExpectedError::ConfigNotFound { path: cfgpath }.into())
            }
            Err(e) => return Err(e.into()),
        };
        let data: Value = cfgtext
            .parse()
            .map_err(|e: toml::de::Error| RepriseExpectedError::ConfigDecode { message: e.to_string() })?;
        let mut table = match data {
            Value::Table(table) => table,
            _ => {
                return Err(RepriseExpectedError::ConfigDecode { message: "top-level value must be a table".to_string() }.into())
            }
        };

        let library_dir = take_path(&mut table, "library_dir", &cfgpath)?.ok_or_else(|| missing_key("library_dir", &cfgpath))?;

        let database_path = match take_path(&mut table, "database_path", &cfgpath)? {
            Some(p) => p,
            None => library_dir.join("library.db"),
        };

        let alt_dir = match take_path(&mut table, "alt_dir", &cfgpath)? {
            Some(p) if p.is_absolute() => p,
            Some(p) => library_dir.join(p),
            None => library_dir.clone(),
        };

        let auto = take_bool(&mut table, "auto", &cfgpath)?.unwrap_or(true);

        let max_workers = match table.remove("max_workers") {
            None => num_cpus::get(),
            Some(Value::Integer(n)) if n > 0 => n as usize,
            Some(Value::Integer(n)) => {
                return Err(invalid_value("max_workers", &cfgpath, format!("must be a positive integer: got {n}")))
            }
            Some(other) => {
                return Err(invalid_value("max_workers", &cfgpath, format!("must be a positive integer: got {}", other.type_str())))
            }
        };

        let path_pairs = take_template_pairs(&mut table, "paths", &cfgpath)?;
        let path_templates =
            PathTemplateConfig::parse(&path_pairs).map_err(|e| invalid_value("paths", &cfgpath, e.to_string()))?;

        let mut convert_embed = true;
        let mut convert_formats = HashMap::new();
        match table.remove("convert") {
            None => {}
            Some(Value::Table(mut convert)) => {
                convert_embed = take_bool(&mut convert, "embed", &cfgpath)?.unwrap_or(true);
                match convert.remove("formats") {
                    None => {}
                    Some(Value::Table(formats)) => {
                        for (name, value) in formats {
                            let over = FormatOverride::from_config(&name, value)
                                .map_err(|msg| invalid_value(&format!("convert.formats.{name}"), &cfgpath, msg))?;
                            convert_formats.insert(name.to_lowercase(), over);
                        }
                    }
                    Some(other) => {
                        return Err(invalid_value("convert.formats", &cfgpath, format!("must be a table: got {}", other.type_str())))
                    }
                }
                warn_unused(&convert, "convert");
            }
            Some(other) => return Err(invalid_value("convert", &cfgpath, format!("must be a table: got {}", other.type_str()))),
        }

        let mut alternatives = Vec::new();
        match table.remove("alternatives") {
            None => {}
            Some(Value::Array(entries)) => {
                for (i, entry) in entries.into_iter().enumerate() {
                    let key = format!("alternatives[{i}]");
                    let mut entry = match entry {
                        Value::Table(t) => t,
                        other => return Err(invalid_value(&key, &cfgpath, format!("must be a table: got {}", other.type_str()))),
                    };
                    let alternative = AlternativeConfig {
                        name: take_str(&mut entry, "name", &cfgpath)?,
                        directory: take_str(&mut entry, "directory", &cfgpath)?,
                        query: take_queries(&mut entry, "query", &cfgpath)?,
                        album_query: take_queries(&mut entry, "album_query", &cfgpath)?,
                        formats: take_str(&mut entry, "formats", &cfgpath)?
                            .map(|s| s.split_whitespace().map(|f| f.to_lowercase()).collect())
                            .unwrap_or_default(),
                        paths: take_template_pairs(&mut entry, "paths", &cfgpath)?,
                        removable: take_bool(&mut entry, "removable", &cfgpath)?.unwrap_or(true),
                    };
                    warn_unused(&entry, &key);
                    alternatives.push(alternative);
                }
            }
            Some(other) => {
                return Err(invalid_value("alternatives", &cfgpath, format!("must be a list of tables: got {}", other.type_str())))
            }
        }

        warn_unused(&table, "the top level");

        Ok(Config {
            library_dir,
            database_path,
            alt_dir,
            auto,
            max_workers,
            path_templates,
            convert_embed,
            convert_formats,
            alternatives,
        })
    }
}
