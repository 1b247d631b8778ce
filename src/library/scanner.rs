use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Result;

/// List of supported audio file extensions
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "wav", "m4a", "aac", "opus",
];

/// Scanner for finding audio files in a directory tree
pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Scan a directory recursively and return all audio file paths, sorted
    pub fn scan<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a directory: {}", directory.display()),
            )
            .into());
        }

        let mut audio_files = Vec::new();

        for entry in WalkDir::new(directory)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            if Self::is_supported(path) {
                audio_files.push(path.to_path_buf());
            }
        }

        audio_files.sort();
        tracing::debug!(count = audio_files.len(), dir = %directory.display(), "scanned music directory");
        Ok(audio_files)
    }

    /// Check the extension against the supported list, ignoring case
    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("album");
        fs::create_dir(&nested).unwrap();

        fs::write(dir.path().join("b.mp3"), b"").unwrap();
        fs::write(dir.path().join("a.FLAC"), b"").unwrap();
        fs::write(dir.path().join("cover.jpg"), b"").unwrap();
        fs::write(nested.join("c.ogg"), b"").unwrap();
        fs::write(dir.path().join("notes"), b"").unwrap();

        let files = DirectoryScanner::scan(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(names, vec!["a.FLAC", "album/c.ogg", "b.mp3"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DirectoryScanner::scan(dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_is_supported() {
        assert!(DirectoryScanner::is_supported(Path::new("song.Mp3")));
        assert!(DirectoryScanner::is_supported(Path::new("/x/y/song.opus")));
        assert!(!DirectoryScanner::is_supported(Path::new("song.txt")));
        assert!(!DirectoryScanner::is_supported(Path::new("song")));
    }
}
