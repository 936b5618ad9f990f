use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader};
use regex::Regex;

use crate::error::ArtError;
use crate::types::{Icon, RawImage};

/// Bounding box for scaled icons (width, height)
pub const ICON_BOUNDS: (u32, u32) = (128, 64);

/// Cover files we recognise, e.g. `cover.jpg`, `AlbumArt.png`, `Album Art.jpeg`
static COVER_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(album[ _-]?art|folder|cover|front)\.(jpe?g|png)$")
        .expect("cover file pattern is valid")
});

/// Last directory we looked at and what we found there
#[derive(Debug, Default)]
pub struct AlbumArtCache {
    last_directory: Option<PathBuf>,
    last_image: Option<Icon>,
}

impl AlbumArtCache {
    fn lookup(&self, directory: &Path) -> Option<Option<Icon>> {
        match &self.last_directory {
            Some(last) if last == directory => Some(self.last_image.clone()),
            _ => None,
        }
    }

    fn store(&mut self, directory: PathBuf, image: Option<Icon>) {
        self.last_directory = Some(directory);
        self.last_image = image;
    }
}

/// Finds the cover image next to the playing track.
///
/// Only one directory is remembered: consecutive tracks from the same album
/// don't touch the filesystem, and a directory that failed to list is not
/// retried until another directory has been seen in between.
#[derive(Debug)]
pub struct AlbumArtResolver {
    art_root: Option<PathBuf>,
    scale: bool,
    default_icon: Option<Icon>,
    cache: AlbumArtCache,
}

impl AlbumArtResolver {
    pub fn new(art_root: Option<PathBuf>, scale: bool, default_icon: Option<Icon>) -> Self {
        Self {
            art_root,
            scale,
            default_icon,
            cache: AlbumArtCache::default(),
        }
    }

    /// Icon for a track, falling back to the default icon
    pub fn resolve(&mut self, track_file: Option<&str>) -> Option<Icon> {
        let directory = match track_file.and_then(|file| self.art_directory(file)) {
            Some(directory) => directory,
            None => return self.default_icon.clone(),
        };

        if let Some(hit) = self.cache.lookup(&directory) {
            log::debug!("Album art cache hit for {}", directory.display());
            return hit;
        }

        let image = match self.scan(&directory) {
            Ok(Some(icon)) => Some(icon),
            Ok(None) => {
                log::debug!("No cover file in {}", directory.display());
                self.default_icon.clone()
            }
            Err(e @ ArtError::Listing { .. }) => {
                log::warn!("{}", e);
                self.default_icon.clone()
            }
            Err(e) => {
                log::warn!("Unusable cover image, using default icon: {}", e);
                self.default_icon.clone()
            }
        };

        self.cache.store(directory, image.clone());
        image
    }

    /// Directory that should hold the track's cover, if we can know it
    fn art_directory(&self, track_file: &str) -> Option<PathBuf> {
        if track_file.contains("://") {
            return None;
        }

        let path = Path::new(track_file);
        if path.is_absolute() {
            return path.parent().map(Path::to_path_buf);
        }

        let root = self.art_root.as_ref()?;
        Some(match path.parent() {
            Some(relative) => root.join(relative),
            None => root.clone(),
        })
    }

    fn scan(&self, directory: &Path) -> Result<Option<Icon>, ArtError> {
        let cover = match find_cover(directory)? {
            Some(cover) => cover,
            None => return Ok(None),
        };

        log::debug!("Found cover file {}", cover.display());
        load_icon(&cover, self.scale).map(Some)
    }
}

/// First matching cover file in `directory`, by file name order
fn find_cover(directory: &Path) -> Result<Option<PathBuf>, ArtError> {
    let listing_error = |source| ArtError::Listing {
        path: directory.to_path_buf(),
        source,
    };

    let mut names: Vec<String> = Vec::new();
    for entry in fs::read_dir(directory).map_err(listing_error)? {
        match entry {
            Ok(entry) => match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => log::debug!("Skipping non UTF-8 file name {:?}", name),
            },
            Err(e) => log::debug!("Skipping unreadable entry in {}: {}", directory.display(), e),
        }
    }
    names.sort();

    Ok(names
        .into_iter()
        .find(|name| COVER_FILE.is_match(name))
        .map(|name| directory.join(name)))
}

/// Load the fallback icon once at startup
pub fn default_icon(path: &Path, scale: bool) -> Option<Icon> {
    if !path.is_file() {
        log::warn!(
            "Default icon {} not found, notifications without album art will have no icon",
            path.display()
        );
        return None;
    }

    match load_icon(path, scale) {
        Ok(icon) => {
            log::info!("Loaded default icon from {}", path.display());
            Some(icon)
        }
        Err(e) => {
            log::warn!("Failed to load default icon, continuing without: {}", e);
            None
        }
    }
}

/// Load an icon file, decoding and scaling it when `scale` is set
pub fn load_icon(path: &Path, scale: bool) -> Result<Icon, ArtError> {
    if !scale {
        return Ok(Icon::Path(path.to_path_buf()));
    }

    let image = decode(path)?;
    let raw = scale_image(&image).ok_or_else(|| ArtError::Scale {
        path: path.to_path_buf(),
        width: image.width(),
        height: image.height(),
    })?;
    Ok(Icon::Raw(Arc::new(raw)))
}

fn decode(path: &Path) -> Result<DynamicImage, ArtError> {
    let decode_error = |source| ArtError::Decode {
        path: path.to_path_buf(),
        source,
    };

    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_error(image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode_error)
}

/// Shrink into [`ICON_BOUNDS`] and flatten to opaque RGBA.
///
/// Returns `None` for empty images.
pub fn scale_image(image: &DynamicImage) -> Option<RawImage> {
    if image.width() == 0 || image.height() == 0 {
        return None;
    }

    let (max_width, max_height) = ICON_BOUNDS;
    let fitted = if image.width() > max_width || image.height() > max_height {
        image.resize(max_width, max_height, image::imageops::FilterType::Lanczos3)
    } else {
        image.clone()
    };

    let mut rgba = fitted.to_rgba8();
    if fitted.color().has_alpha() {
        // Composite over black so renderers that ignore alpha see the same thing
        for pixel in rgba.pixels_mut() {
            let alpha = u16::from(pixel[3]);
            for channel in 0..3 {
                pixel[channel] = ((u16::from(pixel[channel]) * alpha + 127) / 255) as u8;
            }
            pixel[3] = u8::MAX;
        }
    }

    let (width, height) = rgba.dimensions();
    Some(RawImage {
        width: width as i32,
        height: height as i32,
        rowstride: 4 * width as i32,
        has_alpha: true,
        bits_per_sample: 8,
        channels: 4,
        data: rgba.into_raw(),
    })
}

/// Encode a raw icon as PNG bytes
pub fn encode_png(raw: &RawImage) -> Result<Vec<u8>> {
    use image::codecs::png::PngEncoder;
    use image::ImageEncoder;

    let mut buffer = Vec::new();
    let encoder = PngEncoder::new(&mut buffer);

    encoder
        .write_image(
            &raw.data,
            raw.width as u32,
            raw.height as u32,
            image::ExtendedColorType::Rgba8,
        )
        .context("Failed to encode PNG")?;

    Ok(buffer)
}
