/// The sync module drives one full synchronization pass for one collection: it resolves the
/// plan, realizes each action against the filesystem and tag layer, and commits recorded-path
/// updates.
///
/// One synchronous control thread executes moves, writes, art embeds, and removals in plan
/// order. Add jobs for copy/convert collections are dispatched to a bounded worker pool and
/// their results committed only after retrieval, at the end-of-pass drain. Link collections
/// perform everything synchronously. Directory creation anywhere in the pass goes through one
/// shared lock, since the control thread and the workers may race on common ancestors.
///
/// A collection root is treated as exclusively owned by its collection: passes over disjoint
/// roots may run concurrently, but callers must serialize passes over the same collection.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::alternative::{lookup, Alternative, SyncMode};
use crate::common::{input_yn, move_file, prune_dirs};
use crate::config::Config;
use crate::convert;
use crate::errors::{RepriseError, RepriseExpectedError, Result};
use crate::library::{Album, Item, Library};
use crate::media::Media;
use crate::plan::{plan, Action};
use crate::workers::Worker;

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Some(true)/Some(false) from --create/--no-create; None asks interactively.
    pub create: Option<bool>,
}

/// What one pass did. `failed` counts items whose conversion, tag write, or art embed failed;
/// those failures never roll back work already committed for other items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub moved: usize,
    pub written: usize,
    pub embedded: usize,
    pub removed: usize,
    pub failed: usize,
    /// The pass was abandoned before planning because the root was declined.
    pub skipped: bool,
}

impl SyncReport {
    pub fn total_actions(&self) -> usize {
        self.added + self.moved + self.written + self.embedded + self.removed
    }
}

/// Run one update pass for the named collection.
pub fn update(c: &Config, lib: &Library, name: &str, options: &UpdateOptions, media: Arc<dyn Media>) -> Result<SyncReport> {
    let alt = lookup(c, name)?;
    run_pass(c, lib, &alt, options, media)
}

fn confirm_create(alt: &Alternative, create: Option<bool>) -> Result<bool> {
    // A non-removable collection is assumed to always be present or creatable.
    if !alt.removable {
        return Ok(true);
    }
    if let Some(create) = create {
        return Ok(create);
    }
    println!("Collection at '{}' does not exist. Maybe you forgot to mount it.", alt.root.display());
    Ok(input_yn("Do you want to create the collection? (y/n)")?)
}

/// Run one update pass for an already-resolved collection.
pub fn run_pass(c: &Config, lib: &Library, alt: &Alternative, options: &UpdateOptions, media: Arc<dyn Media>) -> Result<SyncReport> {
    if !alt.root.is_dir() {
        if !confirm_create(alt, options.create)? {
            println!("Skipping creation of {}", alt.root.display());
            return Ok(SyncReport { skipped: true, ..Default::default() });
        }
        fs::create_dir_all(&alt.root).map_err(|_| RepriseExpectedError::RootUnavailable { path: alt.root.clone() })?;
    }

    let mut items = lib.items()?;
    alt.item_sort.sort(&mut items);
    let albums = lib.albums()?;
    let planned = plan(alt, &items, &albums);
    let albums_by_id: HashMap<i64, Album> = albums.into_iter().map(|a| (a.id, a)).collect();

    let mut executor = Executor::new(c, lib, alt, media)?;
    for (mut item, actions) in planned {
        let dest = alt.destination(&item);
        let mut path = alt.paths.get(&item);
        let art = item
            .album_id
            .and_then(|id| albums_by_id.get(&id))
            .and_then(|album| album.artpath.clone());
        for &action in &actions {
            if let Err(e) = executor.apply(&mut item, action, &mut path, &dest, art.as_deref()) {
                match action {
                    // Content and tag refreshes fail per item; the pass carries on.
                    Action::Write | Action::EmbedArt => {
                        error!("{e}");
                        executor.report.failed += 1;
                    }
                    _ => return Err(e),
                }
            }
        }
    }
    executor.drain()?;

    let report = executor.report;
    if report.failed > 0 {
        warn!(
            "alternative {} partially updated: {} actions completed, {} items failed",
            alt.name,
            report.total_actions(),
            report.failed
        );
    } else {
        info!("alternative {} updated: {} actions completed", alt.name, report.total_actions());
    }
    Ok(report)
}

/// Applies planned actions. Add jobs are collected in the pool until `drain`.
struct Executor<'a> {
    lib: &'a Library,
    alt: &'a Alternative,
    media: Arc<dyn Media>,
    dir_lock: Arc<Mutex<()>>,
    worker: Option<Worker<Result<(Item, PathBuf)>>>,
    report: SyncReport,
}

impl<'a> Executor<'a> {
    fn new(c: &Config, lib: &'a Library, alt: &'a Alternative, media: Arc<dyn Media>) -> Result<Executor<'a>> {
        // Link creation is cheap; only copy/convert collections get a pool.
        let worker = match alt.mode {
            SyncMode::Link => None,
            SyncMode::Copy | SyncMode::Convert => Some(Worker::new(c.max_workers)?),
        };
        Ok(Executor {
            lib,
            alt,
            media,
            dir_lock: Arc::new(Mutex::new(())),
            worker,
            report: SyncReport::default(),
        })
    }

    fn apply(&mut self, item: &mut Item, action: Action, path: &mut Option<PathBuf>, dest: &Path, art: Option<&Path>) -> Result<()> {
        match action {
            Action::Add => {
                println!("+{}", dest.display());
                match self.alt.mode {
                    SyncMode::Link => self.add_link(item, dest)?,
                    SyncMode::Copy | SyncMode::Convert => self.submit_add(item, dest, art),
                }
            }
            Action::Move => {
                let old = self.recorded(path)?;
                println!(">{} -> {}", old.display(), dest.display());
                match self.alt.mode {
                    SyncMode::Link => {
                        self.remove_realized(&old)?;
                        self.create_symlink(item, dest)?;
                    }
                    SyncMode::Copy | SyncMode::Convert => {
                        self.mkdirall(dest)?;
                        move_file(&old, dest)?;
                        if let Some(parent) = old.parent() {
                            prune_dirs(parent, &self.alt.root)?;
                        }
                    }
                }
                self.alt.paths.set(self.lib, item, dest)?;
                *path = Some(dest.to_path_buf());
                self.report.moved += 1;
            }
            Action::Write => {
                // A symlinked file needs no refresh; its content is the source's.
                if self.alt.mode == SyncMode::Link {
                    return Ok(());
                }
                let path = self.recorded(path)?;
                println!("*{}", path.display());
                if self.alt.should_transcode(item) {
                    // Just checked: should_transcode implies convert mode, which has a spec.
                    let spec = self.alt.convert.as_ref().unwrap();
                    convert::encode(&spec.command, &item.path, &path)?;
                } else {
                    self.media.write_tags(item, &path)?;
                }
                self.report.written += 1;
            }
            Action::EmbedArt => {
                if self.alt.mode == SyncMode::Link {
                    return Ok(());
                }
                let path = self.recorded(path)?;
                println!("~{}", path.display());
                if let Some(art) = art {
                    self.media.embed_art(art, &path)?;
                    self.report.embedded += 1;
                }
            }
            Action::Remove => {
                let old = self.recorded(path)?;
                println!("-{}", old.display());
                self.remove_realized(&old)?;
                self.alt.paths.remove(self.lib, item)?;
                *path = None;
                self.report.removed += 1;
            }
        }
        Ok(())
    }

    /// Dispatch an asynchronous add job: create parents, copy or transcode, optionally embed
    /// art. The recorded path is committed later, when the result is drained.
    fn submit_add(&mut self, item: &Item, dest: &Path, art: Option<&Path>) {
        let transcode_cmd = if self.alt.should_transcode(item) {
            self.alt.convert.as_ref().map(|spec| spec.command.clone())
        } else {
            None
        };
        let embed_art = if self.alt.mode == SyncMode::Convert && self.alt.embed {
            art.map(|p| p.to_path_buf())
        } else {
            None
        };
        let item = item.clone();
        let source = item.path.clone();
        let dest = dest.to_path_buf();
        let lock = Arc::clone(&self.dir_lock);
        let media = Arc::clone(&self.media);

        // Executors are only built with a pool for copy/convert modes.
        self.worker.as_mut().unwrap().submit(move || {
            {
                let _guard = lock.lock().unwrap();
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
            }
            match &transcode_cmd {
                Some(command) => convert::encode(command, &source, &dest)?,
                None => {
                    fs::copy(&source, &dest)?;
                }
            }
            if let Some(art) = &embed_art {
                media.embed_art(art, &dest)?;
            }
            Ok((item, dest))
        });
    }

    fn add_link(&mut self, item: &mut Item, dest: &Path) -> Result<()> {
        self.create_symlink(item, dest)?;
        self.alt.paths.set(self.lib, item, dest)?;
        self.report.added += 1;
        Ok(())
    }

    fn create_symlink(&mut self, item: &Item, dest: &Path) -> Result<()> {
        self.mkdirall(dest)?;
        if fs::symlink_metadata(dest).is_ok() {
            fs::remove_file(dest)?;
        }
        symlink_file(&item.path, dest)?;
        Ok(())
    }

    /// Delete the realized file and prune the directories it leaves empty.
    fn remove_realized(&self, path: &Path) -> Result<()> {
        if fs::symlink_metadata(path).is_ok() {
            fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            prune_dirs(parent, &self.alt.root)?;
        }
        Ok(())
    }

    /// Create the destination's parent directories under the pass-wide lock.
    fn mkdirall(&self, dest: &Path) -> Result<()> {
        let _guard = self.dir_lock.lock().unwrap();
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn recorded(&self, path: &Option<PathBuf>) -> Result<PathBuf> {
        path.clone()
            .ok_or_else(|| RepriseError::Generic("action requires a recorded path, but none is set".to_string()))
    }

    /// Block until every dispatched add job reports, committing each returned destination as
    /// the item's new recorded path. A failed job is reported and skipped; it does not abort
    /// jobs already dispatched.
    fn drain(&mut self) -> Result<()> {
        let Some(worker) = &mut self.worker else { return Ok(()) };
        if worker.pending() > 0 {
            debug!("waiting for {} outstanding add jobs", worker.pending());
        }
        for result in worker.as_completed() {
            match result {
                Ok((mut item, dest)) => {
                    self.alt.paths.set(self.lib, &mut item, &dest)?;
                    self.report.added += 1;
                }
                Err(e) => {
                    error!("{e}");
                    self.report.failed += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn symlink_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(src, dst)
}
