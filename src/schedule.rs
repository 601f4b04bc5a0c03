use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{ScheduleEntry, ScheduleStatus};

pub fn due_on(entries: &[ScheduleEntry], date: NaiveDate) -> Vec<ScheduleEntry> {
    entries
        .iter()
        .filter(|e| e.scheduled_date == date)
        .cloned()
        .collect()
}

pub fn pending_due_on(entries: &[ScheduleEntry], date: NaiveDate) -> Vec<ScheduleEntry> {
    entries
        .iter()
        .filter(|e| e.scheduled_date == date && e.status == ScheduleStatus::Pending)
        .cloned()
        .collect()
}

/// Entries strictly after `date`, earliest first.
pub fn upcoming_after(entries: &[ScheduleEntry], date: NaiveDate) -> Vec<ScheduleEntry> {
    let mut upcoming: Vec<ScheduleEntry> = entries
        .iter()
        .filter(|e| e.scheduled_date > date)
        .cloned()
        .collect();
    upcoming.sort_by_key(|e| e.scheduled_date);
    upcoming
}

pub fn completed(entries: &[ScheduleEntry]) -> Vec<ScheduleEntry> {
    entries
        .iter()
        .filter(|e| e.status == ScheduleStatus::Completed)
        .cloned()
        .collect()
}

pub fn group_by_date(entries: &[ScheduleEntry]) -> BTreeMap<NaiveDate, Vec<ScheduleEntry>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<ScheduleEntry>> = BTreeMap::new();
    for entry in entries {
        grouped
            .entry(entry.scheduled_date)
            .or_default()
            .push(entry.clone());
    }
    grouped
}

/// Completes a pending session and returns the status it had before.
///
/// Completed and missed sessions are left as they are. `None` when no entry
/// has the given id.
pub fn mark_complete(entries: &mut [ScheduleEntry], id: &str) -> Option<ScheduleStatus> {
    let entry = entries.iter_mut().find(|e| e.id == id)?;
    let previous = entry.status;
    if previous == ScheduleStatus::Pending {
        entry.status = ScheduleStatus::Completed;
    }
    Some(previous)
}
