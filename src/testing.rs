use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use crate::config::{AlternativeConfig, Config};
use crate::errors::Result;
use crate::library::{Album, Item, Library};
use crate::media::Media;
use crate::templates::PathTemplateConfig;

static INIT: Once = Once::new();

pub fn init() -> TempDir {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    });
    TempDir::new().expect("failed to create temp dir")
}

pub struct TestEnv {
    pub tempdir: TempDir,
    pub config: Config,
    pub library: Library,
}

/// A fresh config and empty library inside a temp dir, with `alt/` as the alternatives base.
pub fn env() -> TestEnv {
    let tempdir = init();
    let base = tempdir.path();
    fs::create_dir_all(base.join("library")).expect("failed to create library dir");

    let config = Config {
        library_dir: base.join("library"),
        database_path: base.join("library.db"),
        alt_dir: base.join("alt"),
        auto: true,
        max_workers: 2,
        path_templates: PathTemplateConfig::with_default(),
        convert_embed: true,
        convert_formats: HashMap::new(),
        alternatives: vec![],
    };
    let library = Library::open(&config.database_path).expect("failed to open library");
    TestEnv { tempdir, config, library }
}

impl TestEnv {
    /// Register a collection definition under `name`, rooted at `alt/<name>`, with a single
    /// item query.
    pub fn add_alternative(&mut self, name: &str, query: &str, formats: &str) {
        self.config.alternatives.push(AlternativeConfig {
            name: Some(name.to_string()),
            directory: None,
            query: vec![query.to_string()],
            album_query: vec![],
            formats: formats.split_whitespace().map(|f| f.to_lowercase()).collect(),
            paths: vec![],
            removable: true,
        });
    }

    /// Write a fake media file into the library dir and track it.
    pub fn add_track(&self, title: &str, artist: &str, format: &str) -> Item {
        let filename = format!("{artist} - {title}.{}", format.to_lowercase());
        let path = self.config.library_dir.join(filename);
        fs::write(&path, b"AUDIODATA").expect("failed to write track file");
        self.library.add_item(&path, title, artist, format, None).expect("failed to add item")
    }

    /// Create an album with `titles` as its tracks, all in `format`.
    pub fn add_album(&self, album: &str, albumartist: &str, titles: &[&str], format: &str) -> (Album, Vec<Item>) {
        let album_row = self.library.add_album(album, albumartist, None).expect("failed to add album");
        let dir = self.config.library_dir.join(albumartist).join(album);
        fs::create_dir_all(&dir).expect("failed to create album dir");
        let mut items = Vec::new();
        for title in titles {
            let path = dir.join(format!("{title}.{}", format.to_lowercase()));
            fs::write(&path, b"AUDIODATA").expect("failed to write track file");
            items.push(
                self.library
                    .add_item(&path, title, albumartist, format, Some(album_row.id))
                    .expect("failed to add item"),
            );
        }
        (album_row, items)
    }

    pub fn set_attr(&self, item: &mut Item, key: &str, value: &str) {
        self.library.set_item_attribute(item.id, key, value).expect("failed to set attribute");
        item.attributes.insert(key.to_string(), value.to_string());
    }

    pub fn del_attr(&self, item: &mut Item, key: &str) {
        self.library.delete_item_attribute(item.id, key).expect("failed to delete attribute");
        item.attributes.remove(key);
    }

    pub fn reload(&self, item: &Item) -> Item {
        self.library.get_item(item.id).expect("failed to reload item").expect("item vanished")
    }
}

pub fn set_mtime(path: &Path, time: SystemTime) {
    let file = fs::OpenOptions::new().append(true).open(path).expect("failed to open file for mtime change");
    file.set_modified(time).expect("failed to set mtime");
}

pub fn past() -> SystemTime {
    SystemTime::now() - Duration::from_secs(600)
}

/// Last `n` bytes of a file; the conversion-marker assertions look at these.
pub fn file_tail(path: &Path, n: usize) -> Vec<u8> {
    let data = fs::read(path).expect("failed to read file");
    data[data.len().saturating_sub(n)..].to_vec()
}

/// A conversion command that copies and appends `marker`, standing in for a transcoder.
pub fn marker_command(marker: &str) -> String {
    format!("sh -c \"cp '$source' '$dest'; printf {marker} >> '$dest'\"")
}

/// Tag-layer stub that records invocations and freshens the target file.
#[derive(Default)]
pub struct RecordingMedia {
    pub tag_writes: Mutex<Vec<PathBuf>>,
    pub art_embeds: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl RecordingMedia {
    pub fn new() -> Arc<RecordingMedia> {
        Arc::new(RecordingMedia::default())
    }
}

impl Media for RecordingMedia {
    fn write_tags(&self, _item: &Item, path: &Path) -> Result<()> {
        self.tag_writes.lock().unwrap().push(path.to_path_buf());
        if path.is_file() {
            set_mtime(path, SystemTime::now());
        }
        Ok(())
    }

    fn embed_art(&self, art: &Path, path: &Path) -> Result<()> {
        self.art_embeds.lock().unwrap().push((art.to_path_buf(), path.to_path_buf()));
        if path.is_file() {
            set_mtime(path, SystemTime::now());
        }
        Ok(())
    }
}
