//! Event and semantic-fact types for the knowledge graph.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A candidate event extracted from a single day's captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayEvent {
    /// Short event name.
    pub event_name: String,
    /// Date the event was observed on.
    #[serde(default)]
    pub date: String,
    /// Location, when inferable.
    #[serde(default)]
    pub location: String,
    /// Whether the event could span multiple days.
    #[serde(default)]
    pub is_multi_days: bool,
    /// Importance rating 1–3 (3 = major).
    #[serde(default = "default_importance")]
    pub importance: u8,
}

const fn default_importance() -> u8 {
    1
}

/// A consolidated, possibly multi-day event.
///
/// Events are derived, not stored as direct node references: membership is
/// computed by date-range inclusion against each node's capture timestamp and
/// re-evaluated on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Sequential id, scoped to the month list this event was emitted in.
    #[serde(default)]
    pub id: usize,
    /// Event name.
    pub event_name: String,
    /// First day of the event (`YYYY-MM-DD` or a bare year).
    pub start_date: String,
    /// Last day of the event (`YYYY-MM-DD` or a bare year).
    pub end_date: String,
    /// Importance rating 1–3 (3 = major).
    #[serde(default = "default_importance")]
    pub importance: u8,
    /// Finer-grained events merged into this one.
    #[serde(default)]
    pub child_events: Vec<Event>,
}

impl Event {
    /// Parses the event's inclusive date range.
    ///
    /// # Errors
    ///
    /// Returns an error if either date fails to parse.
    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate)> {
        Ok((
            parse_event_date(&self.start_date)?,
            parse_event_date(&self.end_date)?,
        ))
    }

    /// Returns true if `day` falls within the event's date range.
    ///
    /// # Errors
    ///
    /// Returns an error if the event dates fail to parse.
    pub fn contains(&self, day: NaiveDate) -> Result<bool> {
        let (start, end) = self.date_range()?;
        Ok(day >= start && day <= end)
    }
}

/// Parses an event date.
///
/// Accepts an exact day (`2024-06-14`) or a bare year (`2024`, also tolerating
/// a `2024:…` suffix), which resolves to January 1st of that year.
///
/// # Errors
///
/// Returns `Error::Parse` if neither format applies.
pub fn parse_event_date(s: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    let year_part = s.split(':').next().unwrap_or(s).trim();
    year_part
        .parse::<i32>()
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        .ok_or_else(|| Error::parse("parse_event_date", format!("unrecognized date '{s}'")))
}

/// Returns the `YYYY-MM` month key for a `YYYY-MM-DD` date key.
#[must_use]
pub fn month_key(date_key: &str) -> String {
    let mut parts = date_key.split('-');
    match (parts.next(), parts.next()) {
        (Some(y), Some(m)) => format!("{y}-{m}"),
        _ => date_key.to_string(),
    }
}

/// The two-level event index: raw per-day extractions and consolidated
/// per-month events.
///
/// Both maps are checkpoints: a present key means that unit of work is done
/// and reruns skip it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventIndex {
    /// Candidate events per calendar day (`YYYY-MM-DD`).
    #[serde(default)]
    pub by_date: BTreeMap<String, Vec<DayEvent>>,
    /// Consolidated events per month (`YYYY-MM`).
    #[serde(default)]
    pub by_event: BTreeMap<String, Vec<Event>>,
}

impl EventIndex {
    /// Total number of consolidated events across all months.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.by_event.values().map(Vec::len).sum()
    }

    /// Looks up a consolidated event by month key and id.
    #[must_use]
    pub fn get(&self, month: &str, event_id: usize) -> Option<&Event> {
        self.by_event
            .get(month)
            .and_then(|events| events.iter().find(|e| e.id == event_id))
    }
}

/// An activity inferred from one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Sequential id, assigned positionally at save time.
    #[serde(default)]
    pub id: usize,
    /// The activity description.
    pub activity: String,
    /// Key of the node the activity was inferred from.
    pub memory_name: String,
}

/// A durable, non-episodic semantic fact.
///
/// Facts are deduplicated against the whole existing fact set by a
/// reasoning-provider similarity score (0–10): a score of 7 or above merges
/// the new mention into `members` rather than creating a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRecord {
    /// Sequential id, assigned positionally at save time.
    #[serde(default)]
    pub id: usize,
    /// The fact text.
    pub knowledge: String,
    /// Key of the node that first mentioned the fact.
    pub memory_name: String,
    /// Keys of every node that mentioned the fact.
    #[serde(default)]
    pub members: Vec<String>,
}

/// The persisted knowledge graph: events, activities, and semantic facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    /// Event index (per-day and per-month).
    #[serde(default)]
    pub events: EventIndex,
    /// Activity list.
    #[serde(default)]
    pub activity: Vec<ActivityRecord>,
    /// Semantic fact list.
    #[serde(default)]
    pub knowledge: Vec<FactRecord>,
}

impl KnowledgeGraph {
    /// Creates an empty knowledge graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassigns sequential ids from list position.
    ///
    /// Ids are positional and therefore not stable across rebuilds if output
    /// ordering shifts; external references should not rely on them surviving
    /// a full rebuild.
    pub fn assign_sequential_ids(&mut self) {
        for (i, activity) in self.activity.iter_mut().enumerate() {
            activity.id = i;
        }
        for (i, fact) in self.knowledge.iter_mut().enumerate() {
            fact.id = i;
        }
    }
}
