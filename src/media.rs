/// The media module is the boundary to metadata tag writing and artwork embedding. The sync
/// engine only ever talks to the `Media` trait; tests substitute a recording stub, and the
/// binary wires in the lofty-backed `TagWriter`.
use std::fs;
use std::path::Path;

use lofty::config::WriteOptions;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};

use crate::errors::{RepriseExpectedError, Result};
use crate::library::Item;

pub trait Media: Send + Sync {
    /// Re-render the item's current tag state into the file at `path`.
    fn write_tags(&self, item: &Item, path: &Path) -> Result<()>;
    /// Embed the artwork file `art` into the media file at `path` as its front cover.
    fn embed_art(&self, art: &Path, path: &Path) -> Result<()>;
}

/// Production tag writer.
pub struct TagWriter;

impl TagWriter {
    fn open_tag(path: &Path) -> std::result::Result<(lofty::file::TaggedFile, bool), lofty::error::LoftyError> {
        let tagged_file = Probe::open(path)?.read()?;
        let has_tag = tagged_file.primary_tag().is_some();
        Ok((tagged_file, has_tag))
    }
}

impl Media for TagWriter {
    fn write_tags(&self, item: &Item, path: &Path) -> Result<()> {
        let err = |e: String| RepriseExpectedError::TagWrite { path: path.to_path_buf(), message: e };

        let (mut tagged_file, has_tag) = Self::open_tag(path).map_err(|e| err(e.to_string()))?;
        if !has_tag {
            let tag_type = tagged_file.primary_tag_type();
            tagged_file.insert_tag(Tag::new(tag_type));
        }
        // Just inserted above when absent.
        let tag = tagged_file.primary_tag_mut().unwrap();

        tag.set_title(item.title.clone());
        tag.set_artist(item.artist.clone());
        tag.set_album(item.album.clone());
        tag.insert_text(ItemKey::AlbumArtist, item.albumartist.clone());
        for (key, value) in &item.attributes {
            tag.insert_text(ItemKey::Unknown(key.to_uppercase()), value.clone());
        }

        tag.save_to_path(path, WriteOptions::default()).map_err(|e| err(e.to_string()))?;
        Ok(())
    }

    fn embed_art(&self, art: &Path, path: &Path) -> Result<()> {
        let err = |e: String| RepriseExpectedError::ArtEmbed { path: path.to_path_buf(), message: e };

        let data = fs::read(art).map_err(|e| err(format!("failed to read {}: {e}", art.display())))?;
        let mime = match art.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
            Some("png") => Some(MimeType::Png),
            Some("jpg") | Some("jpeg") => Some(MimeType::Jpeg),
            Some("gif") => Some(MimeType::Gif),
            _ => None,
        };
        let picture = Picture::new_unchecked(PictureType::CoverFront, mime, None, data);

        let (mut tagged_file, has_tag) = Self::open_tag(path).map_err(|e| err(e.to_string()))?;
        if !has_tag {
            let tag_type = tagged_file.primary_tag_type();
            tagged_file.insert_tag(Tag::new(tag_type));
        }
        let tag = tagged_file.primary_tag_mut().unwrap();
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(picture);

        tag.save_to_path(path, WriteOptions::default()).map_err(|e| err(e.to_string()))?;
        Ok(())
    }
}
