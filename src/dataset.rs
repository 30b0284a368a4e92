use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context};
use calamine::{open_workbook_auto, Reader};
use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use serde::Serialize;
use tracing::warn;

use crate::grid::{Cell, CellGrid};
use crate::metrics::round_to;
use crate::models::{
    DemographicCategory, Demographics, EventRecord, EventType, NormalizedDataset,
};

pub const EVENTS_SHEET: &str = "Events";
pub const DEMOGRAPHICS_SHEET: &str = "Demographics";

const COL_NAME: &str = "Event Name";
const COL_DATE: &str = "Date";
const COL_TYPE: &str = "Event Type";
const COL_EXPECTED: &str = "Expected Attendance";
const COL_ACTUAL: &str = "Actual Attendance";
const COL_BUDGET: &str = "Total Budget";

const EVENT_COLUMNS: [&str; 6] = [
    COL_NAME,
    COL_DATE,
    COL_TYPE,
    COL_EXPECTED,
    COL_ACTUAL,
    COL_BUDGET,
];

const EXCEL_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

fn excel_date(date: NaiveDate) -> Option<ExcelDateTime> {
    if !EXCEL_YEARS.contains(&date.year()) {
        return None;
    }
    ExcelDateTime::from_ymd(date.year() as u16, date.month() as u8, date.day() as u8).ok()
}

pub fn write_dataset(dataset: &NormalizedDataset, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    let sheet = workbook.add_worksheet().set_name(EVENTS_SHEET)?;
    for (col, title) in EVENT_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (idx, event) in dataset.events.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, &event.name)?;
        if let Some(date) = event.date {
            match excel_date(date) {
                Some(value) => {
                    sheet.write_datetime_with_format(row, 1, &value, &date_format)?;
                }
                None => warn!(event = %event.name, %date, "date outside Excel range; left blank"),
            }
        }
        sheet.write_string(row, 2, event.event_type.label())?;
        if let Some(expected) = event.expected_attendance {
            sheet.write_number(row, 3, expected)?;
        }
        if let Some(actual) = event.actual_attendance {
            sheet.write_number(row, 4, actual)?;
        }
        if let Some(budget) = event.total_budget {
            sheet.write_number(row, 5, budget)?;
        }
    }

    if !dataset.demographics.is_empty() {
        let sheet = workbook.add_worksheet().set_name(DEMOGRAPHICS_SHEET)?;
        for (col, category) in DemographicCategory::ALL.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, category.label(), &header)?;
            sheet.write_number(1, col as u16, dataset.demographics.get(*category))?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_dataset(path: &Path) -> anyhow::Result<NormalizedDataset> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let range = workbook
        .worksheet_range(EVENTS_SHEET)
        .with_context(|| format!("sheet '{EVENTS_SHEET}' missing from {}", path.display()))?;
    let events = parse_events(&CellGrid::from_range(&range))?;

    let demographics = match workbook.worksheet_range(DEMOGRAPHICS_SHEET) {
        Ok(range) => parse_demographics(&CellGrid::from_range(&range)),
        Err(_) => Demographics::new(),
    };

    Ok(NormalizedDataset::new(events, demographics))
}

fn header_index(grid: &CellGrid) -> HashMap<String, usize> {
    (0..grid.width())
        .filter_map(|col| {
            grid.get(0, col)
                .as_text()
                .map(|title| (title.trim().to_string(), col))
        })
        .collect()
}

fn parse_events(grid: &CellGrid) -> anyhow::Result<Vec<EventRecord>> {
    let columns = header_index(grid);
    let name_col = *columns
        .get(COL_NAME)
        .ok_or_else(|| anyhow!("'{COL_NAME}' column missing"))?;
    let column = |title: &str| columns.get(title).copied();
    let cell = |row: usize, col: Option<usize>| {
        col.map(|c| grid.get(row, c)).unwrap_or(&Cell::Empty)
    };

    let mut events = Vec::new();
    for row in 1..grid.height() {
        let name = grid.get(row, name_col).display();
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        let event_type = match cell(row, column(COL_TYPE)).as_text() {
            Some(label) => label
                .parse::<EventType>()
                .unwrap_or_else(|_| EventType::classify(Some(name))),
            None => EventType::classify(Some(name)),
        };

        events.push(EventRecord {
            name: name.to_string(),
            date: cell(row, column(COL_DATE)).as_date(),
            event_type,
            expected_attendance: cell(row, column(COL_EXPECTED)).as_count(),
            actual_attendance: cell(row, column(COL_ACTUAL)).as_count(),
            total_budget: cell(row, column(COL_BUDGET)).as_number(),
            demographics: None,
        });
    }
    Ok(events)
}

fn parse_demographics(grid: &CellGrid) -> Demographics {
    let mut demographics = Demographics::new();
    for col in 0..grid.width() {
        let Some(category) = grid
            .get(0, col)
            .as_text()
            .and_then(DemographicCategory::from_label)
        else {
            continue;
        };
        if let Some(count) = grid.get(1, col).as_count() {
            demographics.set(category, count);
        }
    }
    demographics
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Event Name")]
    name: &'a str,
    #[serde(rename = "Date")]
    date: Option<String>,
    #[serde(rename = "Event Type")]
    event_type: &'static str,
    #[serde(rename = "Expected Attendance")]
    expected: Option<u32>,
    #[serde(rename = "Actual Attendance")]
    actual: Option<u32>,
    #[serde(rename = "Total Budget")]
    budget: Option<f64>,
    #[serde(rename = "Attendance Rate")]
    attendance_rate: Option<f64>,
}

/// Flat single-sheet export of the events table. Returns the row count.
pub fn export_csv(dataset: &NormalizedDataset, path: &Path) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    for event in &dataset.events {
        writer.serialize(CsvRow {
            name: &event.name,
            date: event.date.map(|d| d.format("%Y-%m-%d").to_string()),
            event_type: event.event_type.label(),
            expected: event.expected_attendance,
            actual: event.actual_attendance,
            budget: event.total_budget,
            attendance_rate: event.attendance_rate().map(|r| round_to(r, 1)),
        })?;
    }
    writer.flush()?;
    Ok(dataset.events.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        name: &str,
        date: (i32, u32, u32),
        expected: Option<u32>,
        actual: Option<u32>,
        budget: Option<f64>,
    ) -> EventRecord {
        EventRecord {
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            event_type: EventType::classify(Some(name)),
            expected_attendance: expected,
            actual_attendance: actual,
            total_budget: budget,
            demographics: None,
        }
    }

    fn sample_dataset() -> NormalizedDataset {
        let mut demographics = Demographics::new();
        demographics.set(DemographicCategory::Freshman, 12);
        demographics.set(DemographicCategory::Alumni, 3);
        NormalizedDataset::new(
            vec![
                record("Holi Festival", (2025, 3, 14), Some(300), Some(240), Some(2200.0)),
                record("Freshers Welcome", (2024, 8, 30), Some(120), None, None),
                record("Garba Night", (2024, 10, 12), None, Some(410), Some(1275.5)),
            ],
            demographics,
        )
    }

    #[test]
    fn dataset_survives_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("compiled_events.xlsx");
        let dataset = sample_dataset();

        write_dataset(&dataset, &path).unwrap();
        let loaded = read_dataset(&path).unwrap();

        assert_eq!(loaded.events.len(), 3);
        let names: Vec<&str> = loaded.events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Freshers Welcome", "Garba Night", "Holi Festival"]);
        assert_eq!(loaded.events, dataset.events);
        assert_eq!(loaded.demographics.non_zero(), dataset.demographics.non_zero());
    }

    #[test]
    fn pre_excel_dates_are_left_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compiled_events.xlsx");
        let dataset = NormalizedDataset::new(
            vec![
                record("Garba Night", (24, 10, 12), Some(200), Some(150), None),
                record("Holi Festival", (2025, 3, 14), Some(300), Some(240), None),
            ],
            Demographics::new(),
        );

        write_dataset(&dataset, &path).unwrap();
        let loaded = read_dataset(&path).unwrap();

        assert_eq!(loaded.events.len(), 2);
        assert_eq!(loaded.events[0].name, "Holi Festival");
        assert_eq!(loaded.events[1].name, "Garba Night");
        assert_eq!(loaded.events[1].date, None);
        assert_eq!(loaded.events[1].actual_attendance, Some(150));
    }

    #[test]
    fn demographics_sheet_skipped_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compiled_events.xlsx");
        let dataset = NormalizedDataset::new(sample_dataset().events, Demographics::new());

        write_dataset(&dataset, &path).unwrap();
        let workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec![EVENTS_SHEET.to_string()]);
        assert!(read_dataset(&path).unwrap().demographics.is_empty());
    }

    #[test]
    fn csv_export_writes_one_row_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        let rows = export_csv(&sample_dataset(), &path).unwrap();
        assert_eq!(rows, 3);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "Event Name");
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(&records[0][0], "Freshers Welcome");
        assert_eq!(&records[0][4], "");
        assert_eq!(&records[2][6], "80.0");
    }
}
