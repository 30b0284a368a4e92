use chrono::NaiveDate;

use crate::grid::{Cell, CellGrid};
use crate::models::{DemographicCategory, Demographics};

const NAME_SCAN_ROWS: usize = 5;
const NAME_SCAN_COLS: usize = 3;
const BUDGET_LOOKAHEAD: usize = 4;
const BUDGET_MIN_TOTAL: f64 = 100.0;
const MIN_DEMOGRAPHIC_SAMPLE: u32 = 5;

/// A named predicate over a label cell's text.
pub struct LabelRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
}

fn is_total_rsvp(text: &str) -> bool {
    let upper = text.to_uppercase();
    upper.contains("TOTAL") && upper.contains("RSVP")
}

fn is_raw_tickets(text: &str) -> bool {
    text.contains("Raw Tickets")
}

fn is_budget_total(text: &str) -> bool {
    text.contains("Overall Total") || text.to_uppercase().contains("TOTAL")
}

/// Attendance labels, applied to every cell in scan order. A later match
/// overwrites values from an earlier one.
pub const ATTENDANCE_RULES: [LabelRule; 2] = [
    LabelRule {
        name: "total-rsvp",
        matches: is_total_rsvp,
    },
    LabelRule {
        name: "raw-tickets",
        matches: is_raw_tickets,
    },
];

pub const BUDGET_RULE: LabelRule = LabelRule {
    name: "overall-total",
    matches: is_budget_total,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attendance {
    pub expected: Option<u32>,
    pub actual: Option<u32>,
}

pub fn event_name(overview: &CellGrid) -> Option<String> {
    for row in 0..overview.height().min(NAME_SCAN_ROWS) {
        for col in 0..overview.width().min(NAME_SCAN_COLS) {
            let Some(text) = overview.get(row, col).as_text() else {
                continue;
            };
            if text.chars().count() > 3 && !text.contains("Event") && !text.contains("NaN") {
                let name = text.trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }
    None
}

/// First date-typed cell, or the first value sitting right of an
/// "Event Date" label, whichever the row-major scan reaches first.
pub fn event_date(overview: &CellGrid) -> Option<NaiveDate> {
    for (row, col, cell) in overview.cells() {
        if cell.is_empty() {
            continue;
        }
        if let Cell::Date(date) = cell {
            return Some(*date);
        }
        if col > 0 && overview.get(row, col - 1).display().contains("Event Date") {
            let date = cell.as_date();
            if date.is_none() {
                tracing::warn!(
                    value = %cell.display(),
                    "event date label found but value is not a date"
                );
            }
            return date;
        }
    }
    None
}

pub fn attendance(rsvp: &CellGrid) -> Attendance {
    let mut found = Attendance::default();

    for (row, col, cell) in rsvp.cells() {
        let text = cell.display();
        if text.is_empty() {
            continue;
        }
        for rule in ATTENDANCE_RULES.iter().filter(|r| (r.matches)(&text)) {
            let expected = rsvp.get(row, col + 1);
            if !expected.is_empty() {
                if let Some(count) = expected.as_count() {
                    found.expected = Some(count);
                }
            }
            let actual = rsvp.get(row, col + 2);
            if !actual.is_empty() {
                if let Some(count) = actual.as_count() {
                    found.actual = Some(count);
                }
            }
            tracing::debug!(rule = rule.name, row, col, ?found, "attendance label matched");
        }
    }

    found
}

pub fn total_budget(budget: &CellGrid) -> Option<f64> {
    for (row, col, cell) in budget.cells() {
        let text = cell.display();
        if text.is_empty() || !(BUDGET_RULE.matches)(&text) {
            continue;
        }
        let last = (col + BUDGET_LOOKAHEAD).min(budget.width().saturating_sub(1));
        let total = (col + 1..=last)
            .filter_map(|c| budget.get(row, c).as_number())
            .find(|value| *value > BUDGET_MIN_TOTAL);
        if let Some(total) = total {
            tracing::debug!(rule = BUDGET_RULE.name, row, col, total, "budget total matched");
            return Some(total);
        }
    }
    None
}

/// Tallies attendee cells by class year. Samples of five or fewer are too
/// sparse to report and come back as `None`.
pub fn demographics(attendees: &CellGrid) -> Option<Demographics> {
    let mut counts = Demographics::new();
    for category in DemographicCategory::ALL {
        counts.set(category, 0);
    }

    for (_, _, cell) in attendees.cells() {
        let lowered = cell.display().to_lowercase();
        if lowered.is_empty() {
            continue;
        }
        if let Some(category) = DemographicCategory::classify(&lowered) {
            counts.increment(category);
        }
    }

    if counts.total() > MIN_DEMOGRAPHIC_SAMPLE {
        Some(counts)
    } else {
        None
    }
}
