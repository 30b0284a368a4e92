use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use calamine::{open_workbook_auto, Reader, Sheets};
use tracing::{debug, info, warn};

use crate::grid::CellGrid;
use crate::models::{Demographics, EventRecord, EventType, NormalizedDataset};
use crate::rules;

pub const WORKBOOK_MARKER: &str = "Event Management";
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls"];

pub const OVERVIEW_SHEET: &str = "Overview";
pub const RSVP_SHEET: &str = "RSVP Snapshot";
pub const BUDGET_SHEET: &str = "Budget";
pub const ATTENDEE_SHEET: &str = "Attendee Data";

/// Fields recovered from one workbook before the name check decides whether
/// it becomes an `EventRecord`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedEvent {
    pub name: Option<String>,
    pub date: Option<chrono::NaiveDate>,
    pub expected_attendance: Option<u32>,
    pub actual_attendance: Option<u32>,
    pub total_budget: Option<f64>,
    pub demographics: Option<Demographics>,
}

impl ExtractedEvent {
    pub fn into_record(self) -> Option<EventRecord> {
        let name = self.name?;
        Some(EventRecord {
            event_type: EventType::classify(Some(&name)),
            name,
            date: self.date,
            expected_attendance: self.expected_attendance,
            actual_attendance: self.actual_attendance,
            total_budget: self.total_budget,
            demographics: self.demographics,
        })
    }
}

struct EventWorkbook {
    sheets: Sheets<BufReader<File>>,
}

impl EventWorkbook {
    fn open(path: &Path) -> anyhow::Result<Self> {
        let sheets = open_workbook_auto(path)
            .with_context(|| format!("failed to open workbook {}", path.display()))?;
        Ok(Self { sheets })
    }

    /// A missing or unreadable sheet degrades to `None`.
    fn sheet(&mut self, name: &str) -> Option<CellGrid> {
        if !self.sheets.sheet_names().iter().any(|s| s == name) {
            debug!(sheet = name, "sheet not present");
            return None;
        }
        match self.sheets.worksheet_range(name) {
            Ok(range) => Some(CellGrid::from_range(&range)),
            Err(err) => {
                warn!(sheet = name, error = %err, "could not read sheet");
                None
            }
        }
    }
}

pub fn is_event_workbook(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false);
    has_extension && file_name.contains(WORKBOOK_MARKER)
}

pub fn find_workbooks(data_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(data_dir)
        .with_context(|| format!("failed to list {}", data_dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_event_workbook(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

pub fn extract_workbook(path: &Path) -> anyhow::Result<ExtractedEvent> {
    let mut workbook = EventWorkbook::open(path)?;
    let mut event = ExtractedEvent::default();

    match workbook.sheet(OVERVIEW_SHEET) {
        Some(overview) => {
            event.name = rules::event_name(&overview);
            event.date = rules::event_date(&overview);
        }
        None => warn!(path = %path.display(), "no Overview sheet; name and date unavailable"),
    }

    match workbook.sheet(RSVP_SHEET) {
        Some(rsvp) => {
            let attendance = rules::attendance(&rsvp);
            event.expected_attendance = attendance.expected;
            event.actual_attendance = attendance.actual;
        }
        None => warn!(path = %path.display(), "could not read RSVP Snapshot"),
    }

    event.total_budget = workbook.sheet(BUDGET_SHEET).and_then(|g| rules::total_budget(&g));
    event.demographics = workbook.sheet(ATTENDEE_SHEET).and_then(|g| rules::demographics(&g));

    Ok(event)
}

pub fn extract_all(data_dir: &Path) -> anyhow::Result<NormalizedDataset> {
    let mut events = Vec::new();
    let mut demographics = Demographics::new();

    for path in find_workbooks(data_dir)? {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(file = %file_name, "processing workbook");

        let extracted = match extract_workbook(&path) {
            Ok(extracted) => extracted,
            Err(err) => {
                warn!(
                    file = %file_name,
                    error = %format!("{err:#}"),
                    "skipping unreadable workbook"
                );
                continue;
            }
        };

        let Some(record) = extracted.into_record() else {
            warn!(file = %file_name, "could not extract event name; workbook dropped");
            continue;
        };

        if let Some(counts) = &record.demographics {
            demographics.merge(counts);
        }

        info!(
            event = %record.name,
            date = ?record.date,
            expected = ?record.expected_attendance,
            actual = ?record.actual_attendance,
            budget = ?record.total_budget,
            "extracted event"
        );
        events.push(record);
    }

    Ok(NormalizedDataset::new(events, demographics))
}
