/// The library module encapsulates the primary-library store the sync engine reads from: items,
/// their owning albums, and the flexible per-item attributes that carry each collection's
/// recorded paths.
///
/// The SQLite database is the item/album source of truth for this crate; file contents and
/// modification times live on disk and are always read from there.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::errors::Result;
use crate::query::Queryable;

static LIBRARY_SCHEMA: &str = include_str!("library.sql");

/// One tracked media file in the primary library.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: i64,
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub albumartist: String,
    pub format: String,
    pub album_id: Option<i64>,
    pub attributes: HashMap<String, String>,
}

impl Item {
    /// Modification time of the item's file on disk.
    pub fn mtime(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}

impl Queryable for Item {
    fn get_field(&self, field: &str) -> Option<String> {
        match field {
            "title" => Some(self.title.clone()),
            "artist" => Some(self.artist.clone()),
            "album" => Some(self.album.clone()),
            "albumartist" => Some(self.albumartist.clone()),
            "format" => Some(self.format.clone()),
            "path" => Some(self.path.to_string_lossy().into_owned()),
            _ => self.attributes.get(field).cloned(),
        }
    }
}

/// A group of items sharing album-level tags. Tracked by the engine only as a membership
/// source and as the origin of embeddable artwork.
#[derive(Debug, Clone)]
pub struct Album {
    pub id: i64,
    pub album: String,
    pub albumartist: String,
    pub artpath: Option<PathBuf>,
    pub attributes: HashMap<String, String>,
}

impl Queryable for Album {
    fn get_field(&self, field: &str) -> Option<String> {
        match field {
            "album" => Some(self.album.clone()),
            "albumartist" => Some(self.albumartist.clone()),
            _ => self.attributes.get(field).cloned(),
        }
    }
}

pub struct Library {
    conn: Connection,
}

impl Library {
    /// Open (and if necessary create) the library database at `path`.
    pub fn open(path: &Path) -> Result<Library> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 15000;
            ",
        )?;
        conn.execute_batch(LIBRARY_SCHEMA)?;
        Ok(Library { conn })
    }

    pub fn items(&self) -> Result<Vec<Item>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, title, artist, album, albumartist, format, album_id FROM items ORDER BY id",
        )?;
        let mut items = stmt.query_map([], row_to_item)?.collect::<std::result::Result<Vec<_>, _>>()?;
        for item in &mut items {
            item.attributes = self.item_attributes(item.id)?;
        }
        Ok(items)
    }

    pub fn get_item(&self, id: i64) -> Result<Option<Item>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, title, artist, album, albumartist, format, album_id FROM items WHERE id = ?1",
        )?;
        let item = stmt.query_row(params![id], row_to_item).optional()?;
        match item {
            Some(mut item) => {
                item.attributes = self.item_attributes(item.id)?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    pub fn albums(&self) -> Result<Vec<Album>> {
        let mut stmt = self.conn.prepare("SELECT id, album, albumartist, artpath FROM albums ORDER BY id")?;
        let mut albums = stmt.query_map([], row_to_album)?.collect::<std::result::Result<Vec<_>, _>>()?;
        for album in &mut albums {
            album.attributes = self.album_attributes(album.id)?;
        }
        Ok(albums)
    }

    pub fn add_album(&self, album: &str, albumartist: &str, artpath: Option<&Path>) -> Result<Album> {
        self.conn.execute(
            "INSERT INTO albums (album, albumartist, artpath) VALUES (?1, ?2, ?3)",
            params![album, albumartist, artpath.map(|p| p.to_string_lossy().into_owned())],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(Album {
            id,
            album: album.to_string(),
            albumartist: albumartist.to_string(),
            artpath: artpath.map(|p| p.to_path_buf()),
            attributes: HashMap::new(),
        })
    }

    /// Add an item. When an owning album is given, the item inherits its album-level fields.
    pub fn add_item(&self, path: &Path, title: &str, artist: &str, format: &str, album_id: Option<i64>) -> Result<Item> {
        let (album, albumartist) = match album_id {
            Some(album_id) => {
                let (album, albumartist): (String, String) = self.conn.query_row(
                    "SELECT album, albumartist FROM albums WHERE id = ?1",
                    params![album_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                (album, albumartist)
            }
            None => (String::new(), String::new()),
        };
        self.conn.execute(
            "INSERT INTO items (path, title, artist, album, albumartist, format, album_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![path.to_string_lossy().into_owned(), title, artist, album, albumartist, format, album_id],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(Item {
            id,
            path: path.to_path_buf(),
            title: title.to_string(),
            artist: artist.to_string(),
            album,
            albumartist,
            format: format.to_string(),
            album_id,
            attributes: HashMap::new(),
        })
    }

    pub fn set_item_attribute(&self, item_id: i64, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO item_attributes (item_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (item_id, key) DO UPDATE SET value = excluded.value",
            params![item_id, key, value],
        )?;
        Ok(())
    }

    pub fn delete_item_attribute(&self, item_id: i64, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM item_attributes WHERE item_id = ?1 AND key = ?2", params![item_id, key])?;
        Ok(())
    }

    pub fn set_album_attribute(&self, album_id: i64, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO album_attributes (album_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (album_id, key) DO UPDATE SET value = excluded.value",
            params![album_id, key, value],
        )?;
        Ok(())
    }

    pub fn set_album_artpath(&self, album_id: i64, artpath: Option<&Path>) -> Result<()> {
        self.conn.execute(
            "UPDATE albums SET artpath = ?1 WHERE id = ?2",
            params![artpath.map(|p| p.to_string_lossy().into_owned()), album_id],
        )?;
        Ok(())
    }

    fn item_attributes(&self, item_id: i64) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM item_attributes WHERE item_id = ?1")?;
        let rows = stmt.query_map(params![item_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<std::result::Result<HashMap<_, _>, _>>()?)
    }

    fn album_attributes(&self, album_id: i64) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM album_attributes WHERE album_id = ?1")?;
        let rows = stmt.query_map(params![album_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<std::result::Result<HashMap<_, _>, _>>()?)
    }
}

fn row_to_item(row: &Row) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        path: PathBuf::from(row.get::<_, String>(1)?),
        title: row.get(2)?,
        artist: row.get(3)?,
        album: row.get(4)?,
        albumartist: row.get(5)?,
        format: row.get(6)?,
        album_id: row.get(7)?,
        attributes: HashMap::new(),
    })
}

fn row_to_album(row: &Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        album: row.get(1)?,
        albumartist: row.get(2)?,
        artpath: row.get::<_, Option<String>>(3)?.map(PathBuf::from),
        attributes: HashMap::new(),
    })
}

/// The per-collection recorded-path store: one string attribute per item, keyed by the
/// collection's name. Absence means "not currently materialized".
#[derive(Debug, Clone)]
pub struct PathKeyStore {
    key: String,
}

impl PathKeyStore {
    pub fn new(collection: &str) -> PathKeyStore {
        PathKeyStore { key: format!("alt.{collection}") }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self, item: &Item) -> Option<PathBuf> {
        item.attributes.get(&self.key).map(PathBuf::from)
    }

    /// Record `path` as the item's realized location. Persists immediately.
    pub fn set(&self, lib: &Library, item: &mut Item, path: &Path) -> Result<()> {
        let value = path.to_string_lossy().into_owned();
        lib.set_item_attribute(item.id, &self.key, &value)?;
        item.attributes.insert(self.key.clone(), value);
        Ok(())
    }

    /// Clear the recorded location. Persists immediately.
    pub fn remove(&self, lib: &Library, item: &mut Item) -> Result<()> {
        lib.delete_item_attribute(item.id, &self.key)?;
        item.attributes.remove(&self.key);
        Ok(())
    }
}
