/// The plan module is the diff engine: given a collection's compiled membership and each item's
/// recorded location, decide which file operations a pass must perform.
///
/// Planning only reads filesystem metadata; it never mutates anything.
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use crate::alternative::Alternative;
use crate::common::is_same_file;
use crate::library::{Album, Item};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Move,
    Write,
    EmbedArt,
    Remove,
}

/// Compute the planned actions for every item in the library. Items needing nothing are not
/// emitted. Within one item the order is Move, then Write, then EmbedArt: a write targets the
/// post-move location and art embedding targets the post-write file.
pub fn plan(alt: &Alternative, items: &[Item], albums: &[Album]) -> Vec<(Item, Vec<Action>)> {
    let albums_by_id: HashMap<i64, &Album> = albums.iter().map(|a| (a.id, a)).collect();

    // Items belong either by matching the item query directly or through a matching album.
    let mut album_member_ids: HashSet<i64> = HashSet::new();
    if let Some(album_query) = &alt.album_query {
        let matched_albums: HashSet<i64> = albums.iter().filter(|a| album_query.matches(*a)).map(|a| a.id).collect();
        for item in items {
            if item.album_id.is_some_and(|id| matched_albums.contains(&id)) {
                album_member_ids.insert(item.id);
            }
        }
    }

    let mut out = Vec::new();
    for item in items {
        if album_member_ids.contains(&item.id) || alt.item_query.matches(item) {
            let actions = matched_item_actions(alt, item, &albums_by_id);
            if !actions.is_empty() {
                out.push((item.clone(), actions));
            }
        } else if alt.paths.get(item).is_some() {
            out.push((item.clone(), vec![Action::Remove]));
        }
    }
    out
}

fn matched_item_actions(alt: &Alternative, item: &Item, albums_by_id: &HashMap<i64, &Album>) -> Vec<Action> {
    let mut actions = Vec::new();
    match alt.paths.get(item) {
        Some(path) if path.is_file() => {
            let dest = alt.destination(item);
            if dest != path && !is_same_file(&path, &dest) {
                // A location drift driven by tag changes may coincide with a content change,
                // so the file is re-rendered at the new location rather than assumed reusable.
                actions.push(Action::Move);
                actions.push(Action::Write);
            } else if is_older(mtime(&path), item.mtime()) {
                actions.push(Action::Write);
            }
            if let Some(album) = item.album_id.and_then(|id| albums_by_id.get(&id)) {
                if let Some(art) = &album.artpath {
                    if is_older(mtime(&path), mtime(art)) {
                        actions.push(Action::EmbedArt);
                    }
                }
            }
        }
        // No recorded path, or the recorded file has gone missing from disk.
        _ => actions.push(Action::Add),
    }
    actions
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn is_older(a: Option<SystemTime>, b: Option<SystemTime>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}
