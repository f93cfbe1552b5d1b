use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::models::delivery::{label_for_key, TimelineEntry};

/// Renders timeline instants as local short times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFormatter {
    offset: FixedOffset,
}

impl TimeFormatter {
    /// Offsets outside a day fall back to UTC.
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn short_time(&self, at: &DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format("%H:%M").to_string()
    }
}

impl Default for TimeFormatter {
    fn default() -> Self {
        Self::new(180)
    }
}

/// Same key and same instant collapse to one entry; a new instant for the
/// same key is a separate entry.
pub fn entry_id(status_key: &str, at: &DateTime<Utc>) -> String {
    format!("{status_key}_{}", at.timestamp_millis())
}

pub fn build_entry(status_key: &str, at: DateTime<Utc>, formatter: &TimeFormatter) -> TimelineEntry {
    let display_label = label_for_key(status_key);

    TimelineEntry {
        id: entry_id(status_key, &at),
        status_key: status_key.to_string(),
        description: format!("Delivery status updated to {display_label}."),
        display_label,
        time: formatter.short_time(&at),
        timestamp: at,
    }
}

/// Keyed union of `existing` and the snapshot's timeline, sorted ascending by
/// timestamp. Returns the merged list and how many entries were new.
pub fn merge_timeline(
    existing: &[TimelineEntry],
    incoming: &BTreeMap<String, DateTime<Utc>>,
    formatter: &TimeFormatter,
) -> (Vec<TimelineEntry>, usize) {
    let mut by_id: HashMap<String, TimelineEntry> = existing
        .iter()
        .map(|entry| (entry.id.clone(), entry.clone()))
        .collect();

    let mut added = 0;
    for (status_key, at) in incoming {
        let id = entry_id(status_key, at);
        if !by_id.contains_key(&id) {
            by_id.insert(id, build_entry(status_key, *at, formatter));
            added += 1;
        }
    }

    let mut merged: Vec<TimelineEntry> = by_id.into_values().collect();
    merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    // Times are re-rendered on every merge; the instant is the source of truth.
    for entry in &mut merged {
        entry.time = formatter.short_time(&entry.timestamp);
    }

    (merged, added)
}
