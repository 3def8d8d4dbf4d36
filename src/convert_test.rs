use std::fs;

use crate::convert::*;
use crate::errors::{RepriseError, RepriseExpectedError};
use crate::testing;

#[test]
fn test_split_command_plain() {
    assert_eq!(split_command("ffmpeg -i $source $dest"), vec!["ffmpeg", "-i", "$source", "$dest"]);
}

#[test]
fn test_split_command_quotes() {
    assert_eq!(
        split_command(r#"sh -c "cp '$source' '$dest'""#),
        vec!["sh", "-c", "cp '$source' '$dest'"]
    );
    assert_eq!(split_command("echo 'a b' c"), vec!["echo", "a b", "c"]);
    assert_eq!(split_command(""), Vec::<String>::new());
}

#[test]
fn test_resolve_alias() {
    assert_eq!(resolve_alias("M4A"), "aac");
    assert_eq!(resolve_alias("vorbis"), "ogg");
    assert_eq!(resolve_alias("MP3"), "mp3");
    assert_eq!(resolve_alias("flac"), "flac");
}

#[test]
fn test_get_format_builtin() {
    let env = testing::env();
    let spec = get_format("aac", &env.config).unwrap();
    assert_eq!(spec.extension, "m4a");
    assert!(spec.command.contains("ffmpeg"));

    // Aliases resolve before lookup.
    let spec = get_format("m4a", &env.config).unwrap();
    assert_eq!(spec.extension, "m4a");
}

#[test]
fn test_get_format_config_override() {
    let mut env = testing::env();
    env.config.convert_formats.insert(
        "aac".to_string(),
        FormatOverride { command: Some("mycodec $source $dest".to_string()), extension: None },
    );
    let spec = get_format("aac", &env.config).unwrap();
    assert_eq!(spec.command, "mycodec $source $dest");
    // The built-in extension survives a command-only override.
    assert_eq!(spec.extension, "m4a");
}

#[test]
fn test_get_format_unknown() {
    let env = testing::env();
    assert!(get_format("midi", &env.config).is_err());
}

#[test]
fn test_encode_runs_command_with_substitution() {
    let dir = testing::init();
    let source = dir.path().join("in.ogg");
    let dest = dir.path().join("out.m4a");
    fs::write(&source, b"AUDIODATA").unwrap();

    encode(&testing::marker_command("ISAAC"), &source, &dest).unwrap();
    assert_eq!(testing::file_tail(&dest, 5), b"ISAAC");
    // The source is untouched.
    assert_eq!(fs::read(&source).unwrap(), b"AUDIODATA");
}

#[test]
fn test_encode_failure_is_a_conversion_error() {
    let dir = testing::init();
    let source = dir.path().join("in.ogg");
    let dest = dir.path().join("out.m4a");
    fs::write(&source, b"AUDIODATA").unwrap();

    let err = encode("sh -c 'exit 3'", &source, &dest).unwrap_err();
    match err {
        RepriseError::Expected(RepriseExpectedError::Conversion { path, .. }) => assert_eq!(path, source),
        other => panic!("unexpected error: {other:?}"),
    }

    let err = encode("definitely-not-a-real-binary $source $dest", &source, &dest).unwrap_err();
    assert!(matches!(err, RepriseError::Expected(RepriseExpectedError::Conversion { .. })));
}
