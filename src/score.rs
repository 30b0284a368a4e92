use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metrics::{round_to, EventDetail};

const NEUTRAL_CONSISTENCY: f64 = 15.0;
const NEUTRAL_GROWTH: f64 = 10.0;
const NEUTRAL_EFFICIENCY: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    C,
    #[serde(rename = "C-")]
    CMinus,
    D,
}

impl Grade {
    pub fn from_score(score: f64) -> Grade {
        match score {
            s if s >= 90.0 => Grade::APlus,
            s if s >= 85.0 => Grade::A,
            s if s >= 80.0 => Grade::AMinus,
            s if s >= 75.0 => Grade::BPlus,
            s if s >= 70.0 => Grade::B,
            s if s >= 65.0 => Grade::BMinus,
            s if s >= 60.0 => Grade::CPlus,
            s if s >= 55.0 => Grade::C,
            s if s >= 50.0 => Grade::CMinus,
            _ => Grade::D,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::D => "D",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub attendance: f64,
    pub consistency: f64,
    pub growth: f64,
    pub efficiency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngagementScore {
    pub score: f64,
    pub grade: Grade,
    pub breakdown: ScoreBreakdown,
}

/// Worth up to 40 points.
pub fn attendance_points(rate: f64) -> f64 {
    if rate >= 85.0 {
        40.0
    } else if rate >= 75.0 {
        30.0 + (rate - 75.0)
    } else if rate >= 65.0 {
        20.0 + (rate - 65.0)
    } else {
        (rate * 0.3).max(0.0)
    }
}

/// Population standard deviation of per-event rates, subtracted from 20.
pub fn consistency_points(rates: &[f64]) -> f64 {
    if rates.len() < 2 {
        return NEUTRAL_CONSISTENCY;
    }
    let n = rates.len() as f64;
    let mean = rates.iter().sum::<f64>() / n;
    let variance = rates.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    (20.0 - variance.sqrt()).max(0.0)
}

/// Compares mean turnout of the later half against the earlier half.
/// `actuals` must already be in date order.
pub fn growth_points(actuals: &[f64]) -> f64 {
    if actuals.len() < 2 {
        return NEUTRAL_GROWTH;
    }
    let mid = actuals.len() / 2;
    let (first, second) = actuals.split_at(mid);
    let first_avg = first.iter().sum::<f64>() / first.len() as f64;
    let second_avg = second.iter().sum::<f64>() / second.len() as f64;

    if second_avg >= first_avg {
        let increase = if first_avg > 0.0 {
            (second_avg - first_avg) / first_avg * 100.0
        } else {
            0.0
        };
        (10.0 + increase * 0.5).min(20.0)
    } else {
        let decrease = (first_avg - second_avg) / first_avg * 100.0;
        (10.0 - decrease * 0.5).max(0.0)
    }
}

pub fn efficiency_points(cost_per_attendee: Option<f64>) -> f64 {
    match cost_per_attendee {
        Some(cpa) if cpa > 0.0 => {
            if cpa <= 3.0 {
                20.0
            } else if cpa <= 5.0 {
                18.0
            } else if cpa <= 10.0 {
                15.0
            } else if cpa <= 20.0 {
                10.0
            } else {
                (20.0 - cpa * 0.3).max(0.0)
            }
        }
        _ => NEUTRAL_EFFICIENCY,
    }
}

pub fn engagement_score(
    attendance_rate: f64,
    events: &[EventDetail],
    cost_per_attendee: Option<f64>,
) -> EngagementScore {
    let rates: Vec<f64> = events.iter().filter_map(|e| e.attendance_rate).collect();

    let mut dated: Vec<&EventDetail> = events.iter().filter(|e| e.actual.is_some()).collect();
    dated.sort_by(|a, b| match (a.date, b.date) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    let actuals: Vec<f64> = dated.iter().filter_map(|e| e.actual).map(f64::from).collect();

    let attendance = attendance_points(attendance_rate);
    let consistency = consistency_points(&rates);
    let growth = growth_points(&actuals);
    let efficiency = efficiency_points(cost_per_attendee);
    let total = attendance + consistency + growth + efficiency;

    EngagementScore {
        score: round_to(total, 1),
        grade: Grade::from_score(total),
        breakdown: ScoreBreakdown {
            attendance: round_to(attendance, 1),
            consistency: round_to(consistency, 1),
            growth: round_to(growth, 1),
            efficiency: round_to(efficiency, 1),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use chrono::NaiveDate;

    fn detail(day: u32, expected: u32, actual: u32) -> EventDetail {
        EventDetail {
            name: format!("Event {day}"),
            event_type: EventType::Cultural,
            date: NaiveDate::from_ymd_opt(2024, 9, day),
            expected: Some(expected),
            actual: Some(actual),
            attendance_rate: Some(round_to(actual as f64 / expected as f64 * 100.0, 1)),
            budget: None,
            cost_per_attendee: None,
        }
    }

    #[test]
    fn attendance_thresholds() {
        assert_eq!(attendance_points(0.0), 0.0);
        assert_eq!(attendance_points(64.0), 64.0 * 0.3);
        assert_eq!(attendance_points(65.0), 20.0);
        assert_eq!(attendance_points(70.0), 25.0);
        assert_eq!(attendance_points(75.0), 30.0);
        assert_eq!(attendance_points(84.0), 39.0);
        assert_eq!(attendance_points(85.0), 40.0);
        assert_eq!(attendance_points(100.0), 40.0);
    }

    #[test]
    fn consistency_defaults_and_perfect_spread() {
        assert_eq!(consistency_points(&[]), 15.0);
        assert_eq!(consistency_points(&[72.5]), 15.0);
        assert_eq!(consistency_points(&[80.0, 80.0, 80.0]), 20.0);
        assert_eq!(consistency_points(&[70.0, 90.0]), 10.0);
        assert_eq!(consistency_points(&[10.0, 100.0]), 0.0);
    }

    #[test]
    fn growth_flat_rising_and_falling() {
        assert_eq!(growth_points(&[100.0]), 10.0);
        assert_eq!(growth_points(&[100.0, 100.0]), 10.0);
        assert_eq!(growth_points(&[100.0, 110.0]), 15.0);
        assert_eq!(growth_points(&[100.0, 200.0]), 20.0);
        assert_eq!(growth_points(&[100.0, 80.0]), 0.0);
        assert_eq!(growth_points(&[100.0, 90.0]), 5.0);
        assert_eq!(growth_points(&[0.0, 50.0]), 10.0);
    }

    #[test]
    fn growth_splits_odd_counts_with_smaller_first_half() {
        // first half [100], second half [100, 160] -> +30% -> 25 capped at 20
        assert_eq!(growth_points(&[100.0, 100.0, 160.0]), 20.0);
        // first half [100], second half [90, 90] -> -10% -> 5
        assert_eq!(growth_points(&[100.0, 90.0, 90.0]), 5.0);
    }

    #[test]
    fn efficiency_tiers() {
        assert_eq!(efficiency_points(None), 12.0);
        assert_eq!(efficiency_points(Some(0.0)), 12.0);
        assert_eq!(efficiency_points(Some(2.76)), 20.0);
        assert_eq!(efficiency_points(Some(5.0)), 18.0);
        assert_eq!(efficiency_points(Some(7.5)), 15.0);
        assert_eq!(efficiency_points(Some(20.0)), 10.0);
        assert_eq!(efficiency_points(Some(30.0)), 11.0);
        assert_eq!(efficiency_points(Some(100.0)), 0.0);
    }

    #[test]
    fn grade_boundaries_are_inclusive() {
        let cases = [
            (90.0, Grade::APlus, Grade::A),
            (85.0, Grade::A, Grade::AMinus),
            (80.0, Grade::AMinus, Grade::BPlus),
            (75.0, Grade::BPlus, Grade::B),
            (70.0, Grade::B, Grade::BMinus),
            (65.0, Grade::BMinus, Grade::CPlus),
            (60.0, Grade::CPlus, Grade::C),
            (55.0, Grade::C, Grade::CMinus),
            (50.0, Grade::CMinus, Grade::D),
        ];
        for (boundary, at, below) in cases {
            assert_eq!(Grade::from_score(boundary), at, "at {boundary}");
            assert_eq!(Grade::from_score(boundary - 1.0), below, "below {boundary}");
        }
        assert_eq!(Grade::from_score(0.0), Grade::D);
        assert_eq!(Grade::from_score(100.0), Grade::APlus);
    }

    #[test]
    fn composite_sums_components() {
        let events = vec![detail(1, 100, 90), detail(2, 100, 90)];
        let score = engagement_score(90.0, &events, Some(2.5));
        assert_eq!(score.breakdown.attendance, 40.0);
        assert_eq!(score.breakdown.consistency, 20.0);
        assert_eq!(score.breakdown.growth, 10.0);
        assert_eq!(score.breakdown.efficiency, 20.0);
        assert_eq!(score.score, 90.0);
        assert_eq!(score.grade, Grade::APlus);
    }

    #[test]
    fn composite_stays_within_bounds() {
        let empty = engagement_score(0.0, &[], None);
        assert_eq!(empty.score, 37.0);
        assert_eq!(empty.grade, Grade::D);

        let collapsing = vec![detail(1, 100, 100), detail(2, 1000, 5)];
        let worst = engagement_score(0.0, &collapsing, Some(500.0));
        assert!(worst.score >= 0.0 && worst.score <= 100.0);
        assert_eq!(worst.breakdown.growth, 0.0);
    }

    #[test]
    fn grade_serializes_with_symbol() {
        assert_eq!(serde_json::to_string(&Grade::AMinus).unwrap(), "\"A-\"");
        assert_eq!(Grade::BPlus.to_string(), "B+");
    }
}
