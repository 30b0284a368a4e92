use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "Cultural Festival")]
    CulturalFestival,
    #[serde(rename = "Cultural Show")]
    CulturalShow,
    Formal,
    Social,
    Professional,
    Sports,
    Welcome,
    Cultural,
    Other,
}

/// Keyword groups in precedence order; the first group with a hit decides the type.
const TYPE_KEYWORDS: &[(EventType, &[&str])] = &[
    (EventType::CulturalFestival, &["garba", "diwali", "holi", "navratri"]),
    (EventType::CulturalShow, &["bollywood", "blackout", "mehndi", "sangeet"]),
    (EventType::Formal, &["formal", "dinner", "banquet", "gala"]),
    (EventType::Social, &["sima", "matchmaking", "dating"]),
    (EventType::Professional, &["workshop", "career", "professional", "networking"]),
    (EventType::Sports, &["sports", "cricket", "volleyball", "tournament"]),
    (EventType::Welcome, &["welcome", "freshers", "orientation"]),
];

impl EventType {
    pub fn classify(name: Option<&str>) -> EventType {
        let Some(name) = name else {
            return EventType::Other;
        };
        let lowered = name.to_lowercase();
        TYPE_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(event_type, _)| *event_type)
            .unwrap_or(EventType::Cultural)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventType::CulturalFestival => "Cultural Festival",
            EventType::CulturalShow => "Cultural Show",
            EventType::Formal => "Formal",
            EventType::Social => "Social",
            EventType::Professional => "Professional",
            EventType::Sports => "Sports",
            EventType::Welcome => "Welcome",
            EventType::Cultural => "Cultural",
            EventType::Other => "Other",
        }
    }

    pub fn all() -> [EventType; 9] {
        [
            EventType::CulturalFestival,
            EventType::CulturalShow,
            EventType::Formal,
            EventType::Social,
            EventType::Professional,
            EventType::Sports,
            EventType::Welcome,
            EventType::Cultural,
            EventType::Other,
        ]
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        EventType::all()
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown event type '{trimmed}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DemographicCategory {
    Freshman,
    Sophomore,
    Junior,
    Senior,
    Graduate,
    Alumni,
    Other,
}

impl DemographicCategory {
    pub const ALL: [DemographicCategory; 7] = [
        DemographicCategory::Freshman,
        DemographicCategory::Sophomore,
        DemographicCategory::Junior,
        DemographicCategory::Senior,
        DemographicCategory::Graduate,
        DemographicCategory::Alumni,
        DemographicCategory::Other,
    ];

    /// Matches a lower-cased cell against the category substrings. A cell counts
    /// toward at most one category; "sophmore" is a common misspelling in the
    /// attendee sheets.
    pub fn classify(lowered: &str) -> Option<DemographicCategory> {
        if lowered.contains("freshman") {
            Some(DemographicCategory::Freshman)
        } else if lowered.contains("sophmore") || lowered.contains("sophomore") {
            Some(DemographicCategory::Sophomore)
        } else if lowered.contains("junior") {
            Some(DemographicCategory::Junior)
        } else if lowered.contains("senior") {
            Some(DemographicCategory::Senior)
        } else if ["graduate", "grad", "masters", "phd"]
            .iter()
            .any(|k| lowered.contains(k))
        {
            Some(DemographicCategory::Graduate)
        } else if lowered.contains("alumni") {
            Some(DemographicCategory::Alumni)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DemographicCategory::Freshman => "Freshman",
            DemographicCategory::Sophomore => "Sophomore",
            DemographicCategory::Junior => "Junior",
            DemographicCategory::Senior => "Senior",
            DemographicCategory::Graduate => "Graduate",
            DemographicCategory::Alumni => "Alumni",
            DemographicCategory::Other => "Other",
        }
    }

    pub fn from_label(label: &str) -> Option<DemographicCategory> {
        let trimmed = label.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(trimmed))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Demographics {
    counts: BTreeMap<DemographicCategory, u32>,
}

impl Demographics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, category: DemographicCategory) {
        *self.counts.entry(category).or_insert(0) += 1;
    }

    pub fn set(&mut self, category: DemographicCategory, count: u32) {
        self.counts.insert(category, count);
    }

    pub fn get(&self, category: DemographicCategory) -> u32 {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn merge(&mut self, other: &Demographics) {
        for (category, count) in &other.counts {
            *self.counts.entry(*category).or_insert(0) += count;
        }
    }

    /// Categories with a zero count are left out of every summarized view.
    pub fn non_zero(&self) -> Demographics {
        Demographics {
            counts: self
                .counts
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(category, count)| (*category, *count))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (DemographicCategory, u32)> + '_ {
        self.counts.iter().map(|(category, count)| (*category, *count))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub name: String,
    pub date: Option<NaiveDate>,
    pub event_type: EventType,
    pub expected_attendance: Option<u32>,
    pub actual_attendance: Option<u32>,
    pub total_budget: Option<f64>,
    pub demographics: Option<Demographics>,
}

impl EventRecord {
    /// Per-event conversion, only when both counts exist and something was expected.
    pub fn attendance_rate(&self) -> Option<f64> {
        match (self.expected_attendance, self.actual_attendance) {
            (Some(expected), Some(actual)) if expected > 0 => {
                Some(actual as f64 / expected as f64 * 100.0)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedDataset {
    pub events: Vec<EventRecord>,
    pub demographics: Demographics,
}

impl NormalizedDataset {
    pub fn new(mut events: Vec<EventRecord>, demographics: Demographics) -> Self {
        sort_by_date(&mut events);
        Self {
            events,
            demographics,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Ascending by date; undated events go last and keep their relative order.
pub fn sort_by_date(events: &mut [EventRecord]) {
    events.sort_by(|a, b| match (a.date, b.date) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}
