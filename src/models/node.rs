//! Memory node types and identifiers.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Date format carried in capture metadata (EXIF convention).
pub const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Unique identifier for a memory node (the capture's filename).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// Creates a new node key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of captured media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Still image (photo, screenshot, saved picture).
    Image,
    /// Video clip. Skipped by ingestion; kept for forward compatibility.
    Video,
}

impl MediaType {
    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// How the item was captured.
///
/// Drives the burst-grouping similarity threshold: screenshots need tighter
/// confidence because visual similarity is less informative of true
/// duplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMethod {
    /// Camera photo (has GPS EXIF).
    Photo,
    /// Device screenshot.
    Screenshot,
    /// Unknown origin (e.g. saved from online).
    #[default]
    Unknown,
}

impl CaptureMethod {
    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Screenshot => "screenshot",
            Self::Unknown => "unknown",
        }
    }
}

/// Coarse time-of-day bucket for a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeOfDay {
    /// 05:00–11:59.
    Morning,
    /// 12:00–17:59.
    Afternoon,
    /// 18:00–22:59.
    Evening,
    /// 23:00–04:59.
    Night,
}

impl TimeOfDay {
    /// Buckets an hour of day (0–23).
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            18..=22 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// Returns the display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "Morning",
            Self::Afternoon => "Afternoon",
            Self::Evening => "Evening",
            Self::Night => "Night",
        }
    }
}

/// Temporal capture metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalInfo {
    /// Capture timestamp in [`EXIF_DATE_FORMAT`].
    pub date_string: String,
    /// Weekday name ("Monday", ...).
    pub day_of_week: String,
    /// Coarse time-of-day bucket.
    pub time_of_the_day: TimeOfDay,
}

impl TemporalInfo {
    /// Builds temporal info from a parsed timestamp.
    #[must_use]
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        use chrono::{Datelike, Timelike};
        let day_of_week = match dt.weekday() {
            chrono::Weekday::Mon => "Monday",
            chrono::Weekday::Tue => "Tuesday",
            chrono::Weekday::Wed => "Wednesday",
            chrono::Weekday::Thu => "Thursday",
            chrono::Weekday::Fri => "Friday",
            chrono::Weekday::Sat => "Saturday",
            chrono::Weekday::Sun => "Sunday",
        };
        Self {
            date_string: dt.format(EXIF_DATE_FORMAT).to_string(),
            day_of_week: day_of_week.to_string(),
            time_of_the_day: TimeOfDay::from_hour(dt.hour()),
        }
    }

    /// Parses the capture timestamp back out of `date_string`.
    #[must_use]
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.date_string, EXIF_DATE_FORMAT).ok()
    }
}

/// Capture location, resolved from GPS EXIF via reverse geocoding.
///
/// All fields are optional: screenshots and online saves carry no location at
/// all, and partially resolved addresses fill only the leading fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Decimal-degree (latitude, longitude) pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<(f64, f64)>,
    /// Full reverse-geocoded address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Country component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Postal code component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    /// State component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// County component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    /// City component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl Location {
    /// Returns true if no location information is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.gps.is_none() && self.address.is_none()
    }
}

/// Metadata extracted from a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// When the item was captured.
    pub temporal_info: TemporalInfo,
    /// Where the item was captured (empty for screenshots).
    #[serde(default)]
    pub location: Location,
    /// How the item was captured.
    #[serde(default)]
    pub capture_method: CaptureMethod,
}

/// Visual and textual content extracted from a root node's media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContent {
    /// One-sentence caption describing the image.
    pub caption: String,
    /// Visible objects.
    #[serde(default)]
    pub objects: Vec<String>,
    /// Visible people.
    #[serde(default)]
    pub people: Vec<String>,
    /// OCR-extracted text.
    #[serde(default)]
    pub text: String,
}

/// An enriched record for one captured item.
///
/// The parent/child relation forms a forest: a child never has children of its
/// own, and only root nodes carry content, an activity, and participate in
/// caption-embedding search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryNode {
    /// Unique key (the capture's filename).
    #[serde(rename = "filename")]
    pub key: NodeKey,
    /// Path the item was ingested from.
    pub filepath: PathBuf,
    /// Kind of media.
    pub media_type: MediaType,
    /// Extracted capture metadata. Populated during the metadata pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaMetadata>,
    /// Whether this node was folded into a burst group.
    #[serde(default)]
    pub has_parent: bool,
    /// Key of the burst-group parent, when `has_parent` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_node_name: Option<NodeKey>,
    /// Checkpoint: day-level event extraction has seen this node.
    #[serde(default)]
    pub is_processed_event: bool,
    /// Checkpoint: activity extraction has run for this node.
    #[serde(default)]
    pub is_processed_activity: bool,
    /// Checkpoint: fact extraction has run for this node.
    #[serde(default)]
    pub is_processed_general_knowledge: bool,
    /// Inferred activity, if any was notable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    /// Fact strings emitted for this node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge: Vec<String>,
    /// Ids of the semantic facts this node contributed to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge_ids: Vec<usize>,
    /// Extracted content. Absent for child nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<NodeContent>,
    /// Image embedding, cached in the image vector store rather than the graph.
    #[serde(skip)]
    pub image_embedding: Option<Vec<f32>>,
    /// Burst grouping has run for this node within the current build.
    #[serde(skip)]
    pub grouping_done: bool,
}

impl MemoryNode {
    /// Creates a bare node for a newly ingested item.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        filepath: impl Into<PathBuf>,
        media_type: MediaType,
    ) -> Self {
        Self {
            key: NodeKey::new(filename),
            filepath: filepath.into(),
            media_type,
            metadata: None,
            has_parent: false,
            parent_node_name: None,
            is_processed_event: false,
            is_processed_activity: false,
            is_processed_general_knowledge: false,
            activity: None,
            knowledge: Vec::new(),
            knowledge_ids: Vec::new(),
            content: None,
            image_embedding: None,
            grouping_done: false,
        }
    }

    /// Returns true if this node is a burst-group root.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        !self.has_parent
    }

    /// Marks this node as a child of `parent`.
    pub fn mark_child(&mut self, parent: NodeKey) {
        self.has_parent = true;
        self.parent_node_name = Some(parent);
    }

    /// The capture method, defaulting to `Unknown` before metadata extraction.
    #[must_use]
    pub fn capture_method(&self) -> CaptureMethod {
        self.metadata
            .as_ref()
            .map_or(CaptureMethod::Unknown, |m| m.capture_method)
    }

    /// Parses the capture timestamp from metadata.
    #[must_use]
    pub fn captured_at(&self) -> Option<NaiveDateTime> {
        self.metadata.as_ref().and_then(|m| m.temporal_info.datetime())
    }

    /// The calendar day the item was captured on.
    #[must_use]
    pub fn capture_day(&self) -> Option<NaiveDate> {
        self.captured_at().map(|dt| dt.date())
    }

    /// Renders the node as prompt context for the reasoning provider.
    #[must_use]
    pub fn textualize(&self) -> String {
        let mut out = String::new();
        if let Some(meta) = &self.metadata {
            let t = &meta.temporal_info;
            out.push_str(&format!(
                "Captured time: {}, {} {}\n",
                t.date_string,
                t.day_of_week,
                t.time_of_the_day.as_str()
            ));
            let location = meta.location.address.as_deref().unwrap_or("Unknown");
            out.push_str(&format!("Captured location: {location}\n"));
            out.push_str(&format!(
                "Capture method: {}\n",
                meta.capture_method.as_str()
            ));
        }
        if let Some(content) = &self.content {
            out.push_str("Content:\n");
            out.push_str(&format!("caption: {}\n", content.caption));
            out.push_str(&format!("objects: {}\n", content.objects.join(", ")));
            out.push_str(&format!("people: {}\n", content.people.join(", ")));
            out.push_str(&format!("text: {}\n", content.text));
        }
        out
    }
}
