// Fixed playlist and index arithmetic.
// The playlist is loaded once (from a music directory, or the built-in
// sample list) and never changes afterwards. Navigation wraps in both
// directions, so any index handed out by `Playlist::next_index` or
// `Playlist::previous_index` is always in bounds.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PlayerError, Result};
use crate::library::scanner::DirectoryScanner;
use crate::metadata::extractor::{display_title, MetadataExtractor};

/// Titles of the sample playlist used when no music directory is configured
const SAMPLE_TITLES: &[&str] = &[
    "Track 1 - Happy Sound",
    "Track 2 - Feeling",
    "Track 3 - Old Tune",
    "Track 4 - Remember",
    "Track 5 - Dream",
];

/// A single playlist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub path: PathBuf,
    pub artist: Option<String>,
    pub duration: Option<Duration>,
}

impl Track {
    pub fn new(title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            artist: None,
            duration: None,
        }
    }

    /// Entry titled after the file name, with no other metadata
    pub fn from_path(path: &Path) -> Self {
        Self::new(display_title(path), path)
    }
}

#[derive(Debug, Clone)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Result<Self> {
        if tracks.is_empty() {
            return Err(PlayerError::EmptyPlaylist);
        }
        Ok(Self { tracks })
    }

    /// Load every supported audio file under `directory`, sorted by path
    pub fn from_directory(directory: &Path) -> Result<Self> {
        let files = DirectoryScanner::scan(directory)?;

        let tracks = files
            .iter()
            .filter_map(|path| match MetadataExtractor::extract(path) {
                Ok(track) => Some(track),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    None
                }
            })
            .collect();

        Self::new(tracks)
    }

    /// The built-in five entry playlist, resolved against `base_dir`
    pub fn sample(base_dir: &Path) -> Self {
        let tracks = SAMPLE_TITLES
            .iter()
            .enumerate()
            .map(|(i, title)| Track::new(*title, base_dir.join(format!("sample_{}.mp3", i + 1))))
            .collect();
        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Track> {
        self.tracks.get(index).ok_or(PlayerError::TrackNotFound {
            index,
            len: self.tracks.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.tracks.len()
    }

    pub fn previous_index(&self, index: usize) -> usize {
        if index == 0 || index > self.tracks.len() {
            self.tracks.len() - 1
        } else {
            index - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn playlist(len: usize) -> Playlist {
        Playlist::new(
            (0..len)
                .map(|i| Track::new(format!("Song {}", i), format!("/music/{}.mp3", i)))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_playlist_rejected() {
        assert!(matches!(Playlist::new(vec![]), Err(PlayerError::EmptyPlaylist)));
    }

    #[test]
    fn test_next_wraps_at_end() {
        let p = playlist(5);
        assert_eq!(p.next_index(0), 1);
        assert_eq!(p.next_index(4), 0);
    }

    #[test]
    fn test_previous_wraps_at_start() {
        let p = playlist(5);
        assert_eq!(p.previous_index(0), 4);
        assert_eq!(p.previous_index(4), 3);
    }

    #[test]
    fn test_single_track_wraps_to_itself() {
        let p = playlist(1);
        assert_eq!(p.next_index(0), 0);
        assert_eq!(p.previous_index(0), 0);
    }

    #[test]
    fn test_get_out_of_bounds() {
        let p = playlist(2);
        assert_eq!(p.get(1).unwrap().title, "Song 1");
        assert!(matches!(
            p.get(2),
            Err(PlayerError::TrackNotFound { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_sample_playlist() {
        let p = Playlist::sample(Path::new("/data/samples"));
        assert_eq!(p.len(), 5);
        assert_eq!(p.get(0).unwrap().title, "Track 1 - Happy Sound");
        assert_eq!(
            p.get(4).unwrap().path,
            PathBuf::from("/data/samples/sample_5.mp3")
        );
    }

    #[test]
    fn test_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("02 Second.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("01 First.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"x").unwrap();

        let p = Playlist::from_directory(dir.path()).unwrap();
        let titles: Vec<_> = p.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["01 First", "02 Second"]);
    }

    #[test]
    fn test_from_directory_without_audio() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"x").unwrap();
        assert!(matches!(
            Playlist::from_directory(dir.path()),
            Err(PlayerError::EmptyPlaylist)
        ));
    }

    proptest! {
        #[test]
        fn prop_navigation_stays_in_bounds(len in 1usize..64, start in 0usize..64) {
            let p = playlist(len);
            let index = start % len;
            prop_assert!(p.next_index(index) < len);
            prop_assert!(p.previous_index(index) < len);
        }

        #[test]
        fn prop_next_then_previous_is_identity(len in 1usize..64, start in 0usize..64) {
            let p = playlist(len);
            let index = start % len;
            prop_assert_eq!(p.previous_index(p.next_index(index)), index);
            prop_assert_eq!(p.next_index(p.previous_index(index)), index);
        }
    }
}
