/// The common module is our grab bag of shared toys: filesystem-name sanitization, small
/// collection helpers, the file utilities the sync engine leans on, and logging initialization.
use std::collections::HashSet;
use std::fs;
use std::hash::Hash;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Once;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// Version loaded from .version file at compile time.
pub const VERSION: &str = include_str!(".version");

/// Cap on the byte length of a single generated path component.
pub const MAX_FILENAME_BYTES: usize = 180;

static ILLEGAL_FS_CHARS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[:\?<>\\\*\|"/]+"#).unwrap());

pub fn uniq<T: Clone + Eq + Hash>(xs: Vec<T>) -> Vec<T> {
    let mut rv = Vec::new();
    let mut seen = HashSet::new();
    for x in xs {
        if seen.insert(x.clone()) {
            rv.push(x);
        }
    }
    rv
}

pub fn sanitize_dirname(name: &str, enforce_maxlen: bool) -> String {
    let mut name = ILLEGAL_FS_CHARS_REGEX.replace_all(name, "_").to_string();

    if enforce_maxlen {
        let bytes = name.as_bytes();
        if bytes.len() > MAX_FILENAME_BYTES {
            name = String::from_utf8_lossy(&bytes[..MAX_FILENAME_BYTES]).trim().to_string();
        }
    }

    name.nfd().collect::<String>()
}

pub fn sanitize_filename(name: &str, enforce_maxlen: bool) -> String {
    let mut name = ILLEGAL_FS_CHARS_REGEX.replace_all(name, "_").to_string();

    if enforce_maxlen {
        // Preserve the extension, unless it is longer than 6 bytes.
        let (stem, ext) = match name.rfind('.') {
            Some(pos) => {
                let (s, e) = name.split_at(pos);
                (s.to_string(), e.to_string())
            }
            None => (name.clone(), String::new()),
        };
        let (stem, ext) = if ext.as_bytes().len() > 6 { (name.clone(), String::new()) } else { (stem, ext) };

        let stem_bytes = stem.as_bytes();
        let truncated_stem = if stem_bytes.len() > MAX_FILENAME_BYTES {
            String::from_utf8_lossy(&stem_bytes[..MAX_FILENAME_BYTES]).trim().to_string()
        } else {
            stem
        };

        name = format!("{}{}", truncated_stem, ext);
    }

    name.nfd().collect::<String>()
}

/// Whether two paths refer to the same underlying file. A path that does not exist is never
/// the same file as anything.
#[cfg(unix)]
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}

/// Move a file, falling back to copy+remove when rename fails (e.g. across filesystems).
pub fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(src, dst)?;
            fs::remove_file(src)
        }
    }
}

/// Remove now-empty ancestor directories of `dir`, walking upward until `root` (exclusive) or
/// the first non-empty directory.
pub fn prune_dirs(dir: &Path, root: &Path) -> io::Result<()> {
    let mut cur: PathBuf = dir.to_path_buf();
    while cur != root && cur.starts_with(root) {
        match fs::read_dir(&cur) {
            Ok(mut entries) => {
                if entries.next().is_none() {
                    fs::remove_dir(&cur)?
                } else {
                    break;
                }
            }
            _ => break,
        }
        match cur.parent() {
            Some(parent) => cur = parent.to_path_buf(),
            None => break,
        }
    }
    Ok(())
}

/// Ask the user a yes/no question on stdin, re-prompting until an answer is given.
pub fn input_yn(prompt: &str) -> io::Result<bool> {
    let stdin = io::stdin();
    loop {
        print!("{prompt} ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}

static LOGGING_INIT: Once = Once::new();

/// Install the global tracing subscriber. Idempotent; respects RUST_LOG.
pub fn initialize_logging() {
    LOGGING_INIT.call_once(|| {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}
