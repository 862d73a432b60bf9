use crate::background::leading_integer;
use crate::compositing::encode_png;
use crate::declaration::Declaration;
use crate::error::{Result, SpriteError};
use crate::model::{Placement, SlotSize};
use image::{ImageReader, RgbaImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Decoded pixels plus the numbers grouping and packing need.
#[derive(Debug, Clone)]
pub struct ImageMetadata {
    pub pixels: RgbaImage,
    pub width: u32,
    pub height: u32,
    /// Byte length of the image re-encoded as PNG. An estimate of its on-disk
    /// contribution, not the source file size.
    pub encoded_size: u64,
}

/// Cache entry: metadata plus where the image was drawn, once it has been.
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub meta: ImageMetadata,
    pub placement: Option<Placement>,
}

impl CachedImage {
    pub fn is_placed(&self) -> bool {
        self.placement.is_some()
    }
}

/// Per-run image cache keyed by absolute path. Entries are written once and never
/// invalidated; `placement` is set once the image has been drawn.
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: HashMap<PathBuf, CachedImage>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&CachedImage> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut CachedImage> {
        self.entries.get_mut(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads every path not yet cached. Decodes run concurrently (feature
    /// `parallel`) and all complete before this returns; the first failure is
    /// returned and nothing from the failed group is cached.
    #[instrument(skip_all, fields(requested = paths.len()))]
    pub fn load_all(&mut self, paths: &[PathBuf]) -> Result<()> {
        let mut missing: Vec<&PathBuf> = paths.iter().filter(|p| !self.contains(p)).collect();
        missing.dedup();
        if missing.is_empty() {
            return Ok(());
        }

        #[cfg(feature = "parallel")]
        let loaded: Vec<(PathBuf, ImageMetadata)> = missing
            .par_iter()
            .map(|p| load_image(p).map(|m| ((*p).clone(), m)))
            .collect::<Result<_>>()?;

        #[cfg(not(feature = "parallel"))]
        let loaded: Vec<(PathBuf, ImageMetadata)> = missing
            .iter()
            .map(|p| load_image(p).map(|m| ((*p).clone(), m)))
            .collect::<Result<_>>()?;

        debug!(decoded = loaded.len(), "images loaded");
        for (path, meta) in loaded {
            self.entries.entry(path).or_insert(CachedImage {
                meta,
                placement: None,
            });
        }
        Ok(())
    }
}

/// Decodes one image and estimates its encoded size.
pub fn load_image(path: &Path) -> Result<ImageMetadata> {
    let img = ImageReader::open(path)
        .map_err(|e| SpriteError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| SpriteError::io(path, e))?
        .decode()
        .map_err(|e| SpriteError::Decode {
            path: path.to_path_buf(),
            source: e,
        })?;
    let pixels = img.to_rgba8();
    let (width, height) = pixels.dimensions();
    let encoded_size = encode_png(&pixels)?.len() as u64;
    Ok(ImageMetadata {
        pixels,
        width,
        height,
        encoded_size,
    })
}

/// Numeric value of a `px` length; anything else (missing, `%`, `em`, `auto`) is 0.
/// Lengths beyond `u32::MAX` clamp to it.
pub fn px_value(value: Option<&str>) -> u32 {
    match value {
        Some(v) if v.contains("px") => {
            u32::try_from(leading_integer(v).unwrap_or(0).max(0)).unwrap_or(u32::MAX)
        }
        _ => 0,
    }
}

/// Slot for one image: the largest declared `width`/`height` across its
/// declarations, at least the image size, plus `margin` on each axis.
pub fn slot_size<'a>(
    meta: &ImageMetadata,
    declarations: impl IntoIterator<Item = &'a Declaration>,
    margin: u32,
) -> SlotSize {
    let mut w = meta.width;
    let mut h = meta.height;
    for decl in declarations {
        w = w.max(px_value(decl.get("width")));
        h = h.max(px_value(decl.get("height")));
    }
    SlotSize {
        w: w.saturating_add(margin),
        h: h.saturating_add(margin),
    }
}
