//! Media ingestion collaborators.
//!
//! A [`MediaSource`] enumerates raw captures and a [`MetadataExtractor`]
//! resolves when/where/how each one was taken. Rich EXIF and GPS parsing is
//! an external concern; the bundled [`MtimeExtractor`] is the degradation
//! path that falls back to filesystem modification time.

use crate::models::{CaptureMethod, Location, MediaMetadata, MediaType, TemporalInfo};
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Image extensions accepted by ingestion.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic"];

/// Video extensions recognized but skipped.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];

/// Extension classification outcome.
enum ScanKind {
    Image,
    Video,
}

/// One raw capture discovered by a media source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMedia {
    /// File name, used as the node key.
    pub filename: String,
    /// Full path to the media file.
    pub filepath: PathBuf,
    /// Kind of media.
    pub media_type: MediaType,
}

impl RawMedia {
    /// Reads the media bytes from disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::Ingestion` if the file cannot be read.
    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.filepath).map_err(|e| Error::Ingestion {
            filename: self.filename.clone(),
            reason: e.to_string(),
        })
    }
}

/// Trait for raw-media enumeration.
pub trait MediaSource: Send + Sync {
    /// Enumerates the captures to ingest, in a deterministic order.
    ///
    /// # Errors
    ///
    /// Returns an error if the source itself cannot be read. Individual
    /// unreadable items are skipped with a warning instead.
    fn scan(&self) -> Result<Vec<RawMedia>>;
}

/// Directory-walking media source.
///
/// Accepts jpg/jpeg/png/heic images. Video files are recognized and skipped;
/// dotfiles and unrecognized extensions are ignored. Entries come back sorted
/// by filename so repeated scans see the same order.
pub struct DirectorySource {
    /// Directory to scan.
    root: PathBuf,
}

impl DirectorySource {
    /// Creates a source over the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Classifies a path by extension.
    fn classify(path: &Path) -> Option<ScanKind> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(ScanKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(ScanKind::Video)
        } else {
            None
        }
    }
}

impl MediaSource for DirectorySource {
    fn scan(&self) -> Result<Vec<RawMedia>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            Error::service(
                "scan_media",
                format!("cannot read {}: {e}", self.root.display()),
            )
        })?;

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::service("scan_media", e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if filename.starts_with('.') {
                continue;
            }

            match Self::classify(&path) {
                Some(ScanKind::Image) => found.push(RawMedia {
                    filename: filename.to_string(),
                    filepath: path.clone(),
                    media_type: MediaType::Image,
                }),
                Some(ScanKind::Video) => {
                    tracing::debug!(filename, "skipping video file");
                }
                None => {}
            }
        }

        found.sort_by(|a, b| a.filename.cmp(&b.filename));
        tracing::info!(count = found.len(), root = %self.root.display(), "scanned media directory");
        Ok(found)
    }
}

/// Trait for capture-metadata resolution.
pub trait MetadataExtractor: Send + Sync {
    /// Extracts when/where/how the capture was taken.
    ///
    /// # Errors
    ///
    /// Returns `Error::Metadata` when nothing at all can be resolved; callers
    /// degrade rather than abort.
    fn extract(&self, media: &RawMedia) -> Result<MediaMetadata>;
}

/// Fallback extractor using file modification time.
///
/// Produces an empty location and capture method `unknown`; every capture
/// still gets a usable timestamp so date sorting and day grouping work.
#[derive(Debug, Clone, Copy, Default)]
pub struct MtimeExtractor;

impl MtimeExtractor {
    /// Creates a new extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MetadataExtractor for MtimeExtractor {
    fn extract(&self, media: &RawMedia) -> Result<MediaMetadata> {
        let modified = fs::metadata(&media.filepath)
            .and_then(|m| m.modified())
            .map_err(|e| Error::Metadata {
                filename: media.filename.clone(),
                cause: e.to_string(),
            })?;

        let datetime = chrono::DateTime::<chrono::Local>::from(modified).naive_local();
        Ok(MediaMetadata {
            temporal_info: TemporalInfo::from_datetime(datetime),
            location: Location::default(),
            capture_method: CaptureMethod::Unknown,
        })
    }
}
