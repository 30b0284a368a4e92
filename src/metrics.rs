use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Demographics, EventRecord, EventType, NormalizedDataset};
use crate::score::{self, EngagementScore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetail {
    pub name: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub date: Option<NaiveDate>,
    pub expected: Option<u32>,
    pub actual: Option<u32>,
    pub attendance_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_attendee: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub total_events: usize,
    pub date_range: Option<String>,
    pub first_event_date: Option<NaiveDate>,
    pub last_event_date: Option<NaiveDate>,
    pub event_types: BTreeMap<EventType, usize>,
    pub avg_attendance: f64,
    pub total_attendees: u64,
    pub total_registered: u64,
    pub attendance_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_budget_per_event: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_attendee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_cost_per_attendee: Option<f64>,
    pub best_performing_event: Option<String>,
    pub highest_attendance: Option<u32>,
    pub best_conversion_event: Option<String>,
    pub best_conversion_rate: Option<f64>,
    pub events: Vec<EventDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demographics: Option<Demographics>,
    pub engagement_score: EngagementScore,
}

impl SummaryDocument {
    pub fn has_budget(&self) -> bool {
        self.total_budget.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypePrediction {
    pub avg_attendance: f64,
    pub attendance_rate: f64,
    pub sample_size: usize,
    pub min_attendance: Option<u32>,
    pub max_attendance: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_cost_per_attendee: Option<f64>,
}

/// Halves go to the even neighbour, so a 120/121 average reads 120.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}

/// Sums over events where both counts are present; a missing count is
/// excluded, never read as zero.
fn attendance_totals<'a>(events: impl Iterator<Item = &'a EventRecord>) -> (u64, u64) {
    events
        .filter_map(|e| Some((e.expected_attendance?, e.actual_attendance?)))
        .fold((0, 0), |(expected, actual), (e, a)| {
            (expected + e as u64, actual + a as u64)
        })
}

fn rate(actual: u64, expected: u64) -> f64 {
    if expected == 0 {
        0.0
    } else {
        actual as f64 / expected as f64 * 100.0
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn date_label(first: NaiveDate, last: NaiveDate) -> String {
    format!("{} to {}", first.format("%b %Y"), last.format("%b %Y"))
}

/// Highest value wins; ties keep the earliest event in dataset order.
fn first_max<'a, T: PartialOrd + Copy>(
    events: &'a [EventRecord],
    key: impl Fn(&EventRecord) -> Option<T>,
) -> Option<(&'a EventRecord, T)> {
    let mut best: Option<(&EventRecord, T)> = None;
    for event in events {
        let Some(value) = key(event) else {
            continue;
        };
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((event, value)),
        }
    }
    best
}

fn event_detail(event: &EventRecord) -> EventDetail {
    let cost_per_attendee = match (event.total_budget, event.actual_attendance) {
        (Some(budget), Some(actual)) if actual > 0 => Some(round_to(budget / actual as f64, 2)),
        _ => None,
    };
    EventDetail {
        name: event.name.clone(),
        event_type: event.event_type,
        date: event.date,
        expected: event.expected_attendance,
        actual: event.actual_attendance,
        attendance_rate: event.attendance_rate().map(|r| round_to(r, 1)),
        budget: event.total_budget.map(|b| round_to(b, 2)),
        cost_per_attendee,
    }
}

pub fn build_summary(dataset: &NormalizedDataset) -> SummaryDocument {
    let events = &dataset.events;
    let total_events = events.len();

    let dates: Vec<NaiveDate> = events.iter().filter_map(|e| e.date).collect();
    let first_event_date = dates.iter().min().copied();
    let last_event_date = dates.iter().max().copied();

    let mut event_types = BTreeMap::new();
    for event in events {
        *event_types.entry(event.event_type).or_insert(0) += 1;
    }

    let (total_registered, total_attendees) = attendance_totals(events.iter());
    let complete_actuals: Vec<f64> = events
        .iter()
        .filter(|e| e.expected_attendance.is_some())
        .filter_map(|e| e.actual_attendance.map(f64::from))
        .collect();

    let budgets: Vec<f64> = events.iter().filter_map(|e| e.total_budget).collect();
    let (total_budget, avg_budget_per_event, cost_per_attendee, avg_cost_per_attendee) =
        if budgets.is_empty() {
            (None, None, None, None)
        } else {
            let total: f64 = budgets.iter().sum();
            // Numerator covers budgeted events only; denominator is every event's turnout.
            let all_actual: u64 = events
                .iter()
                .filter_map(|e| e.actual_attendance)
                .map(u64::from)
                .sum();
            let budgeted_actual: u64 = events
                .iter()
                .filter(|e| e.total_budget.is_some())
                .filter_map(|e| e.actual_attendance)
                .map(u64::from)
                .sum();
            (
                Some(round_to(total, 2)),
                Some(round_to(total / total_events as f64, 2)),
                (all_actual > 0).then(|| round_to(total / all_actual as f64, 2)),
                (budgeted_actual > 0).then(|| round_to(total / budgeted_actual as f64, 2)),
            )
        };

    let best_performer = first_max(events, |e| e.actual_attendance);
    let best_conversion = first_max(events, |e| e.attendance_rate());

    let demographics = Some(dataset.demographics.non_zero()).filter(|d| !d.is_empty());

    let details: Vec<EventDetail> = events.iter().map(event_detail).collect();
    let attendance_rate = round_to(rate(total_attendees, total_registered), 1);
    let engagement_score = score::engagement_score(attendance_rate, &details, cost_per_attendee);

    SummaryDocument {
        total_events,
        date_range: first_event_date.zip(last_event_date).map(|(f, l)| date_label(f, l)),
        first_event_date,
        last_event_date,
        event_types,
        avg_attendance: round_to(mean(&complete_actuals).unwrap_or(0.0), 1),
        total_attendees,
        total_registered,
        attendance_rate,
        total_budget,
        avg_budget_per_event,
        cost_per_attendee,
        avg_cost_per_attendee,
        best_performing_event: best_performer.map(|(e, _)| e.name.clone()),
        highest_attendance: best_performer.map(|(_, actual)| actual),
        best_conversion_event: best_conversion.map(|(e, _)| e.name.clone()),
        best_conversion_rate: best_conversion.map(|(_, r)| round_to(r, 1)),
        events: details,
        demographics,
        engagement_score,
    }
}

pub fn predict_by_type(dataset: &NormalizedDataset) -> BTreeMap<EventType, TypePrediction> {
    let mut groups: BTreeMap<EventType, Vec<&EventRecord>> = BTreeMap::new();
    for event in &dataset.events {
        groups.entry(event.event_type).or_default().push(event);
    }

    groups
        .into_iter()
        .map(|(event_type, events)| {
            let actuals: Vec<u32> = events.iter().filter_map(|e| e.actual_attendance).collect();
            let actual_values: Vec<f64> = actuals.iter().copied().map(f64::from).collect();
            let (expected, actual) = attendance_totals(events.iter().copied());

            let budgeted: Vec<&&EventRecord> =
                events.iter().filter(|e| e.total_budget.is_some()).collect();
            let budget_values: Vec<f64> = budgeted.iter().filter_map(|e| e.total_budget).collect();
            let budgeted_actual: u64 = budgeted
                .iter()
                .filter_map(|e| e.actual_attendance)
                .map(u64::from)
                .sum();

            let prediction = TypePrediction {
                avg_attendance: round_to(mean(&actual_values).unwrap_or(0.0), 0),
                attendance_rate: round_to(rate(actual, expected), 1),
                sample_size: events.len(),
                min_attendance: actuals.iter().min().copied(),
                max_attendance: actuals.iter().max().copied(),
                avg_budget: mean(&budget_values).map(|b| round_to(b, 2)),
                avg_cost_per_attendee: (!budget_values.is_empty() && budgeted_actual > 0).then(|| {
                    round_to(budget_values.iter().sum::<f64>() / budgeted_actual as f64, 2)
                }),
            };
            (event_type, prediction)
        })
        .collect()
}
