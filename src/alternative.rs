/// The alternative module builds the runtime collection record for one configured alternative:
/// compiled membership queries, the resolved root directory, the sync strategy, and the
/// recorded-path store.
///
/// Copy, convert, and link behavior is one record carrying a mode tag; the executor dispatches
/// on it. There is no per-strategy type.
use std::path::PathBuf;

use tracing::warn;

use crate::common::uniq;
use crate::config::{AlternativeConfig, Config};
use crate::convert::{self, FormatSpec};
use crate::errors::{RepriseExpectedError, Result};
use crate::library::{Item, PathKeyStore};
use crate::query::{self, Query, Sort};
use crate::templates::PathTemplateConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Mirror matching files by copying them.
    Copy,
    /// Mirror matching files, transcoding any file whose format is not accepted.
    Convert,
    /// Mirror matching files as symbolic links into the primary library.
    Link,
}

pub struct Alternative {
    pub name: String,
    pub root: PathBuf,
    pub mode: SyncMode,
    pub item_query: Query,
    pub item_sort: Sort,
    pub album_query: Option<Query>,
    /// Accepted formats, canonicalized. Items already in one of these are not transcoded.
    pub formats: Vec<String>,
    /// Conversion command and target extension, from the first accepted format.
    pub convert: Option<FormatSpec>,
    /// Embed album art into files produced by add jobs (convert mode only).
    pub embed: bool,
    pub removable: bool,
    pub paths: PathKeyStore,
    pub templates: PathTemplateConfig,
}

impl Alternative {
    pub fn build(c: &Config, ac: &AlternativeConfig) -> Result<Alternative> {
        let name = ac
            .name
            .clone()
            .ok_or_else(|| RepriseExpectedError::Generic("alternative configuration is missing a name".to_string()))?;

        let (item_query, item_sort) = query::compile(&ac.query).map_err(|e| RepriseExpectedError::InvalidQuery {
            collection: name.clone(),
            message: e.to_string(),
        })?;
        let album_query = if ac.album_query.is_empty() {
            None
        } else {
            let (album_query, _) = query::compile(&ac.album_query).map_err(|e| RepriseExpectedError::InvalidQuery {
                collection: name.clone(),
                message: e.to_string(),
            })?;
            Some(album_query)
        };

        let (mode, formats, convert) = if ac.formats.len() == 1 && ac.formats[0] == "link" {
            (SyncMode::Link, Vec::new(), None)
        } else if ac.formats.is_empty() {
            (SyncMode::Copy, Vec::new(), None)
        } else {
            // Aliases can make distinct configured names collapse into one format.
            let formats = uniq(ac.formats.iter().map(|f| convert::resolve_alias(f)).collect());
            let spec = convert::get_format(&formats[0], c)?;
            (SyncMode::Convert, formats, Some(spec))
        };

        let templates = if ac.paths.is_empty() {
            c.path_templates.clone()
        } else {
            PathTemplateConfig::parse(&ac.paths)?
        };

        let dir = ac.directory.clone().unwrap_or_else(|| name.clone());
        let dir = PathBuf::from(shellexpand::tilde(&dir).into_owned());
        let root = if dir.is_absolute() { dir } else { c.alt_dir.join(dir) };

        Ok(Alternative {
            paths: PathKeyStore::new(&name),
            name,
            root,
            mode,
            item_query,
            item_sort,
            album_query,
            formats,
            convert,
            embed: c.convert_embed,
            removable: ac.removable,
            templates,
        })
    }

    /// Where the item's realized file belongs right now, from the current template table and
    /// the item's current tags.
    pub fn destination(&self, item: &Item) -> PathBuf {
        let rel = self.templates.destination(item);
        let extension = match &self.convert {
            Some(spec) if self.should_transcode(item) => spec.extension.clone(),
            _ => item
                .path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
        };
        let dest = self.root.join(rel);
        if extension.is_empty() {
            dest
        } else {
            let mut s = dest.into_os_string();
            s.push(".");
            s.push(&extension);
            PathBuf::from(s)
        }
    }

    /// A format match skips transcoding; the file is only copied.
    pub fn should_transcode(&self, item: &Item) -> bool {
        self.mode == SyncMode::Convert && !self.formats.contains(&convert::resolve_alias(&item.format))
    }
}

/// Build every usable collection from the configuration. Definitions without a name and
/// definitions that fail to compile are warned about and skipped; they do not fail the others.
pub fn build_alternatives(c: &Config) -> Vec<Alternative> {
    let mut alternatives = Vec::new();
    for ac in &c.alternatives {
        let Some(name) = &ac.name else {
            warn!("alternative configuration is missing a name; skipping it");
            continue;
        };
        match Alternative::build(c, ac) {
            Ok(alt) => alternatives.push(alt),
            Err(e) => warn!("skipping alternative {name}: {e}"),
        }
    }
    alternatives
}

/// Resolve one collection by name for an update pass.
pub fn lookup(c: &Config, name: &str) -> Result<Alternative> {
    build_alternatives(c)
        .into_iter()
        .find(|alt| alt.name == name)
        .ok_or_else(|| RepriseExpectedError::CollectionNotFound { name: name.to_string() }.into())
}
