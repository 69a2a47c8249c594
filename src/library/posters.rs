// src/library/posters.rs
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, warn};

/// URL prefix under which the web layer serves the posters directory.
pub const POSTER_URL_PREFIX: &str = "/static";
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("decode image from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },
    #[error("encode jpeg: {0}")]
    Encode(#[source] image::ImageError),
    #[error("write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Local artwork storage. Returns the reference recorded in the catalog.
pub trait PosterStore {
    fn store(&self, url: &str, title: &str) -> Result<String, AssetError>;
}

/// Filesystem-safe file stem for a title: `"Alien: Covenant"` → `"Alien__Covenant"`.
pub fn poster_slug(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

pub fn poster_file_name(title: &str) -> String {
    format!("{}.jpg", poster_slug(title))
}

fn poster_reference(file_name: &str) -> String {
    format!("{POSTER_URL_PREFIX}/{}", urlencoding::encode(file_name))
}

/// Downloads posters with the shared client, downsizes them and stores JPEGs in `dir`.
pub struct PosterCache {
    client: Client,
    dir: PathBuf,
    max_width: u32,
}

impl PosterCache {
    pub fn new(client: Client, dir: PathBuf, max_width: u32) -> Self {
        Self {
            client,
            dir,
            max_width,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let download_err = |source| AssetError::Download {
            url: url.to_string(),
            source,
        };
        let resp = self.client.get(url).send().map_err(download_err)?;
        if !resp.status().is_success() {
            return Err(AssetError::Status {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.bytes().map_err(download_err)?.to_vec())
    }

    fn write_atomic(&self, dest: &Path, bytes: &[u8]) -> Result<(), AssetError> {
        let write_err = |source| AssetError::Write {
            path: dest.to_path_buf(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(write_err)?;
        let tmp = dest.with_extension("jpg.tmp");
        fs::write(&tmp, bytes).map_err(write_err)?;
        fs::rename(&tmp, dest).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            write_err(source)
        })
    }
}

/// Resize to `max_width` (keeping aspect) when wider, then encode as JPEG.
pub fn encode_poster(img: DynamicImage, max_width: u32) -> Result<Vec<u8>, AssetError> {
    let (w, h) = img.dimensions();
    let out = if w > max_width {
        let new_h = ((h as f32) * (max_width as f32 / w as f32))
            .round()
            .max(1.0) as u32;
        img.resize_exact(max_width, new_h, FilterType::CatmullRom)
    } else {
        img
    };

    let mut jpeg_bytes: Vec<u8> = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut jpeg_bytes), JPEG_QUALITY);
    DynamicImage::ImageRgb8(out.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(AssetError::Encode)?;
    Ok(jpeg_bytes)
}

impl PosterStore for PosterCache {
    fn store(&self, url: &str, title: &str) -> Result<String, AssetError> {
        let file_name = poster_file_name(title);
        let dest = self.dir.join(&file_name);

        // If already present, reuse it.
        if dest.is_file() {
            debug!("Poster for `{title}` already cached at {}", dest.display());
            return Ok(poster_reference(&file_name));
        }

        let bytes = self.download(url)?;
        let img = image::load_from_memory(&bytes).map_err(|source| AssetError::Decode {
            url: url.to_string(),
            source,
        })?;
        let jpeg = encode_poster(img, self.max_width)?;
        self.write_atomic(&dest, &jpeg)?;

        debug!("Stored poster for `{title}` at {}", dest.display());
        Ok(poster_reference(&file_name))
    }
}

/// Removes a partially written poster left by an interrupted run.
pub fn prune_stale_temp_files(dir: &Path) -> std::io::Result<usize> {
    let mut removed = 0usize;
    let read_dir = match fs::read_dir(dir) {
        Ok(iter) => iter,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };
    for entry in read_dir {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => warn!("Failed to remove {}: {err}", path.display()),
            }
        }
    }
    Ok(removed)
}
