use crate::config::*;
use crate::errors::{RepriseError, RepriseExpectedError};
use crate::testing;

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = testing::init();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn test_config_minimal() {
    let (_dir, path) = write_config(
        r#"
        library_dir = "/music"
        "#,
    );
    let config = Config::parse(Some(&path)).unwrap();

    assert_eq!(config.library_dir, std::path::Path::new("/music"));
    assert_eq!(config.database_path, std::path::Path::new("/music/library.db"));
    assert_eq!(config.alt_dir, std::path::Path::new("/music"));
    assert!(config.auto);
    assert!(config.max_workers >= 1);
    assert!(config.convert_embed);
    assert!(config.alternatives.is_empty());
}

#[test]
fn test_config_full() {
    let (_dir, path) = write_config(
        r#"
        library_dir = "/music"
        database_path = "/state/library.db"
        alt_dir = "external"
        auto = false
        max_workers = 4

        [paths]
        default = "$artist/$title"

        [convert]
        embed = false

        [convert.formats.aac]
        command = "mycodec $source $dest"
        extension = "m4a"

        [convert.formats.ogg]
        command = "oggenc $source $dest"

        [[alternatives]]
        name = "myplayer"
        directory = "player"
        query = "onplayer:true"
        formats = "aac mp3"
        removable = false

        [[alternatives]]
        name = "by-year"
        query = ["artist:bach", "artist:mozart"]
        album_query = "compilation:true"
        formats = "link"
        paths = { default = "$year/$title" }
        "#,
    );
    let config = Config::parse(Some(&path)).unwrap();

    assert_eq!(config.database_path, std::path::Path::new("/state/library.db"));
    // A relative alt_dir resolves against the library dir.
    assert_eq!(config.alt_dir, std::path::Path::new("/music/external"));
    assert!(!config.auto);
    assert_eq!(config.max_workers, 4);
    assert!(!config.convert_embed);

    let aac = &config.convert_formats["aac"];
    assert_eq!(aac.command.as_deref(), Some("mycodec $source $dest"));
    assert_eq!(aac.extension.as_deref(), Some("m4a"));
    let ogg = &config.convert_formats["ogg"];
    assert_eq!(ogg.command.as_deref(), Some("oggenc $source $dest"));
    assert_eq!(ogg.extension, None);

    assert_eq!(config.alternatives.len(), 2);
    let player = &config.alternatives[0];
    assert_eq!(player.name.as_deref(), Some("myplayer"));
    assert_eq!(player.directory.as_deref(), Some("player"));
    assert_eq!(player.query, vec!["onplayer:true"]);
    assert_eq!(player.formats, vec!["aac", "mp3"]);
    assert!(!player.removable);

    let by_year = &config.alternatives[1];
    assert_eq!(by_year.query, vec!["artist:bach", "artist:mozart"]);
    assert_eq!(by_year.album_query, vec!["compilation:true"]);
    assert_eq!(by_year.formats, vec!["link"]);
    assert_eq!(by_year.paths, vec![("default".to_string(), "$year/$title".to_string())]);
    assert!(by_year.removable);
}

#[test]
fn test_config_missing_library_dir() {
    let (_dir, path) = write_config("auto = true");
    let err = Config::parse(Some(&path)).unwrap_err();
    match err {
        RepriseError::Expected(RepriseExpectedError::MissingConfigKey { key, .. }) => {
            assert_eq!(key, "library_dir")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_config_not_found() {
    let dir = testing::init();
    let err = Config::parse(Some(&dir.path().join("nope.toml"))).unwrap_err();
    assert!(matches!(err, RepriseError::Expected(RepriseExpectedError::ConfigNotFound { .. })));
}

#[test]
fn test_config_invalid_toml() {
    let (_dir, path) = write_config("library_dir = [[[");
    let err = Config::parse(Some(&path)).unwrap_err();
    assert!(matches!(err, RepriseError::Expected(RepriseExpectedError::ConfigDecode { .. })));
}

#[test]
fn test_config_invalid_value_types() {
    let (_dir, path) = write_config(
        r#"
        library_dir = "/music"
        max_workers = "many"
        "#,
    );
    let err = Config::parse(Some(&path)).unwrap_err();
    match err {
        RepriseError::Expected(RepriseExpectedError::InvalidConfigValue { key, .. }) => {
            assert_eq!(key, "max_workers")
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let (_dir, path) = write_config(
        r#"
        library_dir = "/music"
        [[alternatives]]
        name = "x"
        removable = "yes"
        "#,
    );
    let err = Config::parse(Some(&path)).unwrap_err();
    assert!(matches!(err, RepriseError::Expected(RepriseExpectedError::InvalidConfigValue { key, .. }) if key == "removable"));
}

#[test]
fn test_config_missing_name_is_parsed_not_rejected() {
    // A nameless definition survives parsing; it is skipped with a warning at build time.
    let (_dir, path) = write_config(
        r#"
        library_dir = "/music"
        [[alternatives]]
        query = "onplayer:true"
        "#,
    );
    let config = Config::parse(Some(&path)).unwrap();
    assert_eq!(config.alternatives.len(), 1);
    assert_eq!(config.alternatives[0].name, None);
}
