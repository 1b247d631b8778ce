// Metadata extractor using lofty with id3 fallback for problematic MP3 files
use id3::TagLike;
use lofty::prelude::{Accessor, AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use std::path::Path;
use std::time::Duration;

use crate::error::{PlayerError, Result};
use crate::playlist::Track;

pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Build a playlist entry for `file_path`.
    ///
    /// Fails only when the file itself is missing; broken tags degrade to the file stem.
    pub fn extract(file_path: &Path) -> Result<Track> {
        if !file_path.is_file() {
            return Err(PlayerError::Metadata(format!(
                "no such file: {}",
                file_path.display()
            )));
        }

        match Self::extract_with_lofty(file_path) {
            Ok(track) => Ok(track),
            Err(e) => {
                tracing::debug!(path = %file_path.display(), error = %e, "lofty could not read tags");
                Ok(Self::extract_with_fallback(file_path))
            }
        }
    }

    fn extract_with_lofty(file_path: &Path) -> Result<Track> {
        let tagged_file = Probe::open(file_path)
            .map_err(|e| PlayerError::Metadata(e.to_string()))?
            .guess_file_type()?
            .read()
            .map_err(|e| PlayerError::Metadata(e.to_string()))?;

        let tag = tagged_file.primary_tag().or(tagged_file.first_tag());
        let properties = tagged_file.properties();

        let title = tag
            .and_then(|t| t.title().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| display_title(file_path));
        let artist = tag.and_then(|t| t.artist().map(|s| s.to_string()));

        let duration = properties.duration();
        let duration = (!duration.is_zero()).then_some(duration);

        Ok(Track {
            title,
            path: file_path.to_path_buf(),
            artist,
            duration,
        })
    }

    /// id3 for MP3 files lofty rejects, otherwise just the file name
    fn extract_with_fallback(file_path: &Path) -> Track {
        let is_mp3 = file_path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case("mp3"))
            .unwrap_or(false);

        if is_mp3 {
            match id3::Tag::read_from_path(file_path) {
                Ok(tag) => {
                    tracing::debug!(path = %file_path.display(), "extracted metadata using id3 fallback");
                    return Track {
                        title: tag
                            .title()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| display_title(file_path)),
                        path: file_path.to_path_buf(),
                        artist: tag.artist().map(|s| s.to_string()),
                        // TLEN is stored in milliseconds
                        duration: tag.duration().map(|ms| Duration::from_millis(ms as u64)),
                    };
                }
                Err(e) => {
                    tracing::debug!(path = %file_path.display(), error = %e, "id3 fallback failed");
                }
            }
        }

        Track::from_path(file_path)
    }
}

/// Title shown when a file carries no usable tags: its stem, or "Unknown"
pub fn display_title(file_path: &Path) -> String {
    file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}
