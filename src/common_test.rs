use std::fs;

use crate::common::*;
use crate::testing;

#[test]
fn test_uniq() {
    let input = vec![1, 2, 2, 3, 1, 4, 3];
    assert_eq!(uniq(input), vec![1, 2, 3, 4]);
}

#[test]
fn test_sanitize_dirname() {
    assert_eq!(sanitize_dirname("test:dir?", false), "test_dir_");
    assert_eq!(sanitize_dirname("AC/DC", false), "AC_DC");
    let long = "x".repeat(MAX_FILENAME_BYTES + 40);
    assert_eq!(sanitize_dirname(&long, true).len(), MAX_FILENAME_BYTES);
}

#[test]
fn test_sanitize_filename_preserves_extension() {
    assert_eq!(sanitize_filename("test:file?.mp3", false), "test_file_.mp3");

    let long = format!("{}.mp3", "x".repeat(MAX_FILENAME_BYTES + 40));
    let result = sanitize_filename(&long, true);
    assert!(result.ends_with(".mp3"));
    assert!(result.len() <= MAX_FILENAME_BYTES + 4);

    // Extensions longer than 6 bytes are not treated as extensions.
    let result = sanitize_filename(&format!("{}.verylongext", "x".repeat(MAX_FILENAME_BYTES + 40)), true);
    assert!(!result.contains('.'));
}

#[test]
fn test_is_same_file() {
    let dir = testing::init();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    fs::write(&a, b"x").unwrap();
    fs::write(&b, b"x").unwrap();
    assert!(is_same_file(&a, &a));
    assert!(!is_same_file(&a, &b));
    assert!(!is_same_file(&a, &dir.path().join("missing")));

    fs::hard_link(&a, dir.path().join("hardlink")).unwrap();
    assert!(is_same_file(&a, &dir.path().join("hardlink")));
}

#[test]
fn test_move_file() {
    let dir = testing::init();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::write(&src, b"payload").unwrap();
    move_file(&src, &dst).unwrap();
    assert!(!src.exists());
    assert_eq!(fs::read(&dst).unwrap(), b"payload");
}

#[test]
fn test_prune_dirs_stops_at_root_and_nonempty() {
    let dir = testing::init();
    let root = dir.path().join("root");
    let deep = root.join("a/b/c");
    fs::create_dir_all(&deep).unwrap();
    fs::write(root.join("a/keep.txt"), b"x").unwrap();

    prune_dirs(&deep, &root).unwrap();
    assert!(!root.join("a/b").exists());
    // a/ still holds keep.txt, so pruning stops there.
    assert!(root.join("a").exists());
    assert!(root.exists());
}

#[test]
fn test_prune_dirs_never_removes_root() {
    let dir = testing::init();
    let root = dir.path().join("root");
    let deep = root.join("a/b");
    fs::create_dir_all(&deep).unwrap();

    prune_dirs(&deep, &root).unwrap();
    assert!(root.exists());
    assert!(!root.join("a").exists());
}

#[test]
fn test_prune_dirs_outside_root_is_a_no_op() {
    let dir = testing::init();
    let root = dir.path().join("root");
    let outside = dir.path().join("outside");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&outside).unwrap();

    prune_dirs(&outside, &root).unwrap();
    assert!(outside.exists());
}
