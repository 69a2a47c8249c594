// src/library/media.rs
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

pub const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "mkv", "avi", "mov", "wmv", "m4v"];

pub fn is_video_ext(p: &Path) -> bool {
    let ext = p
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    VIDEO_EXTENSIONS.contains(&ext.as_str())
}

/// First playable file in `folder`, in directory listing order (not sorted).
pub fn find_media_file(folder: &Path) -> Option<PathBuf> {
    let read_dir = match fs::read_dir(folder) {
        Ok(iter) => iter,
        Err(err) => {
            warn!("Media scan: unable to read {}: {err}", folder.display());
            return None;
        }
    };

    for entry in read_dir {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("Media scan: failed entry in {}: {err}", folder.display());
                continue;
            }
        };
        let path = entry.path();
        let is_file = entry
            .file_type()
            .map(|ft| ft.is_file() || (ft.is_symlink() && path.is_file()))
            .unwrap_or(false);
        if is_file && is_video_ext(&path) {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(is_video_ext(Path::new("/m/Alien.MKV")));
        assert!(is_video_ext(Path::new("clip.m4v")));
        assert!(!is_video_ext(Path::new("poster.jpg")));
        assert!(!is_video_ext(Path::new("README")));
    }

    #[test]
    fn finds_video_and_ignores_others() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join("movie.srt"), b"x").unwrap();
        fs::create_dir(dir.path().join("extras.mkv")).unwrap();
        assert_eq!(find_media_file(dir.path()), None);

        fs::write(dir.path().join("Movie.Mp4"), b"x").unwrap();
        assert_eq!(
            find_media_file(dir.path()),
            Some(dir.path().join("Movie.Mp4"))
        );
    }

    #[test]
    fn unreadable_folder_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_media_file(&dir.path().join("missing")), None);
    }
}
