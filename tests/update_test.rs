//! End-to-end passes through the public API: configuration text in, synchronized directory
//! trees out.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use reprise::config::Config;
use reprise::errors::Result;
use reprise::library::{Item, Library};
use reprise::media::Media;
use reprise::sync::{update, UpdateOptions};

/// The engine under test never needs real tag IO here.
struct NullMedia;

impl Media for NullMedia {
    fn write_tags(&self, _item: &Item, _path: &Path) -> Result<()> {
        Ok(())
    }
    fn embed_art(&self, _art: &Path, _path: &Path) -> Result<()> {
        Ok(())
    }
}

fn setup(config_body: &str) -> (TempDir, Config, Library) {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    fs::create_dir_all(base.join("library")).unwrap();

    let config_text = format!("library_dir = {:?}\n{config_body}", base.join("library").to_str().unwrap());
    let config_path = base.join("config.toml");
    fs::write(&config_path, config_text).unwrap();

    let config = Config::parse(Some(&config_path)).unwrap();
    let library = Library::open(&config.database_path).unwrap();
    (dir, config, library)
}

fn add_track(library: &Library, library_dir: &Path, artist: &str, title: &str, format: &str) -> Item {
    let path = library_dir.join(format!("{artist} - {title}.{}", format.to_lowercase()));
    fs::write(&path, b"AUDIODATA").unwrap();
    library.add_item(&path, title, artist, format, None).unwrap()
}

fn tag(library: &Library, item: &Item, key: &str, value: &str) {
    library.set_item_attribute(item.id, key, value).unwrap();
}

fn untag(library: &Library, item: &Item, key: &str) {
    library.delete_item_attribute(item.id, key).unwrap();
}

fn recorded(library: &Library, item: &Item, name: &str) -> Option<PathBuf> {
    library.get_item(item.id).unwrap().unwrap().attributes.get(&format!("alt.{name}")).map(PathBuf::from)
}

fn tail(path: &Path, n: usize) -> Vec<u8> {
    let data = fs::read(path).unwrap();
    data[data.len().saturating_sub(n)..].to_vec()
}

#[test]
fn test_convert_collection_end_to_end() {
    let (dir, config, library) = setup(
        r#"
        [convert.formats.aac]
        command = "sh -c \"cp '$source' '$dest'; printf ISAAC >> '$dest'\""
        extension = "m4a"

        [[alternatives]]
        name = "myplayer"
        query = "onplayer:true"
        formats = "aac mp3"
        paths = { default = "$artist/$title" }
        "#,
    );
    let library_dir = &config.library_dir;

    let bach_mp3 = add_track(&library, library_dir, "Bach", "was mp3", "MP3");
    let bach_m4a = add_track(&library, library_dir, "Bach", "was m4a", "M4A");
    let bach_ogg = add_track(&library, library_dir, "Bach", "was ogg", "OGG");
    let beet_ogg = add_track(&library, library_dir, "Beethoven", "was ogg", "OGG");
    for item in [&bach_mp3, &bach_m4a, &bach_ogg] {
        tag(&library, item, "onplayer", "true");
    }

    let options = UpdateOptions { create: Some(true) };
    let report = update(&config, &library, "myplayer", &options, Arc::new(NullMedia)).unwrap();
    assert_eq!(report.added, 3);
    assert_eq!(report.failed, 0);

    let root = dir.path().join("library/myplayer");
    let from_mp3 = root.join("Bach/was mp3.mp3");
    let from_m4a = root.join("Bach/was m4a.m4a");
    let from_ogg = root.join("Bach/was ogg.m4a");

    // Accepted formats are copied, not transcoded; the ogg goes through the aac command.
    assert_ne!(tail(&from_mp3, 5), b"ISAAC");
    assert_ne!(tail(&from_m4a, 5), b"ISAAC");
    assert_eq!(tail(&from_ogg, 5), b"ISAAC");
    assert!(!root.join("Beethoven").exists());

    assert_eq!(recorded(&library, &bach_ogg, "myplayer"), Some(from_ogg.clone()));

    // Membership flips: Bach leaves, Beethoven joins.
    for item in [&bach_mp3, &bach_m4a, &bach_ogg] {
        untag(&library, item, "onplayer");
    }
    tag(&library, &beet_ogg, "onplayer", "true");

    let report = update(&config, &library, "myplayer", &options, Arc::new(NullMedia)).unwrap();
    assert_eq!(report.removed, 3);
    assert_eq!(report.added, 1);

    assert!(!from_mp3.exists());
    assert!(!from_m4a.exists());
    assert!(!from_ogg.exists());
    assert_eq!(tail(&root.join("Beethoven/was ogg.m4a"), 5), b"ISAAC");
    assert_eq!(recorded(&library, &bach_ogg, "myplayer"), None);
}

#[test]
fn test_symlink_view_end_to_end() {
    let (dir, config, library) = setup(
        r#"
        [[alternatives]]
        name = "by-year"
        formats = "link"
        paths = { default = "$year/$album/$title" }
        "#,
    );

    let album = library.add_album("Thriller", "Michael Jackson", None).unwrap();
    let album_dir = config.library_dir.join("Michael Jackson/Thriller");
    fs::create_dir_all(&album_dir).unwrap();
    let source = album_dir.join("track 1.mp3");
    fs::write(&source, b"AUDIODATA").unwrap();
    let item = library.add_item(&source, "track 1", "Michael Jackson", "MP3", Some(album.id)).unwrap();
    tag(&library, &item, "year", "1982");

    let options = UpdateOptions { create: Some(true) };
    let report = update(&config, &library, "by-year", &options, Arc::new(NullMedia)).unwrap();
    assert_eq!(report.added, 1);

    let link = dir.path().join("library/by-year/1982/Thriller/track 1.mp3");
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_link(&link).unwrap(), source);
    assert_eq!(fs::read(&link).unwrap(), b"AUDIODATA");

    // A settled view needs nothing on the next pass.
    let report = update(&config, &library, "by-year", &options, Arc::new(NullMedia)).unwrap();
    assert_eq!(report.total_actions(), 0);
}

#[test]
fn test_album_query_pulls_in_member_items() {
    let (_dir, config, library) = setup(
        r#"
        [[alternatives]]
        name = "albums"
        query = "title:zzznope"
        album_query = "takeout:yes"
        paths = { default = "$album/$title" }
        "#,
    );

    let album = library.add_album("Suites", "Bach", None).unwrap();
    let album_dir = config.library_dir.join("Suites");
    fs::create_dir_all(&album_dir).unwrap();
    let mut items = Vec::new();
    for title in ["Prelude", "Allemande"] {
        let path = album_dir.join(format!("{title}.mp3"));
        fs::write(&path, b"AUDIODATA").unwrap();
        items.push(library.add_item(&path, title, "Bach", "MP3", Some(album.id)).unwrap());
    }
    library.set_album_attribute(album.id, "takeout", "yes").unwrap();

    let options = UpdateOptions { create: Some(true) };
    let report = update(&config, &library, "albums", &options, Arc::new(NullMedia)).unwrap();
    assert_eq!(report.added, 2);
    for item in &items {
        assert!(recorded(&library, item, "albums").unwrap().is_file());
    }
}
