use chrono::{DateTime, Duration, Utc};

use crate::database::models::{MonitoringPoint, Severity, ViolationType};

/// Degrees Fahrenheit from the middle of the range beyond which a violation is high severity
const HIGH_SEVERITY_DEVIATION: f64 = 10.0;

/// Accepted `check_frequency_hours`: hourly up to once a year
pub const CHECK_FREQUENCY_HOURS: std::ops::RangeInclusive<i64> = 1..=8784;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub is_within_range: bool,
    pub violation: Option<(ViolationType, Severity)>,
}

/// Classifies a reading against the point's inclusive range.
pub fn evaluate(point: &MonitoringPoint, temperature: f64) -> Reading {
    let min = point.min_temp_fahrenheit;
    let max = point.max_temp_fahrenheit;
    if (min..=max).contains(&temperature) {
        return Reading { is_within_range: true, violation: None };
    }
    let violation_type = if temperature < min { ViolationType::TooCold } else { ViolationType::TooHot };
    let midpoint = (min + max) / 2.0;
    let severity = if (temperature - midpoint).abs() > HIGH_SEVERITY_DEVIATION {
        Severity::High
    } else {
        Severity::Medium
    };
    Reading { is_within_range: false, violation: Some((violation_type, severity)) }
}

/// A point is due when it has never been logged or its last log is older
/// than its check frequency. A frequency too large to add never comes due.
pub fn is_check_due(last_recorded: Option<DateTime<Utc>>, frequency_hours: i64, now: DateTime<Utc>) -> bool {
    match last_recorded {
        None => true,
        Some(last) => Duration::try_hours(frequency_hours)
            .and_then(|every| last.checked_add_signed(every))
            .is_some_and(|next| next < now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(min: f64, max: f64) -> MonitoringPoint {
        MonitoringPoint {
            id: 1,
            equipment_type: "walk-in cooler".into(),
            department_id: Some(1),
            min_temp_fahrenheit: min,
            max_temp_fahrenheit: max,
            check_frequency_hours: 4,
            is_active: true,
            equipment_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let p = point(33.0, 41.0);
        assert!(evaluate(&p, 33.0).is_within_range);
        assert!(evaluate(&p, 41.0).is_within_range);
        assert_eq!(evaluate(&p, 37.0).violation, None);
    }

    #[test]
    fn out_of_range_classifies_direction_and_severity() {
        let p = point(33.0, 41.0);
        // midpoint 37
        assert_eq!(evaluate(&p, 45.0).violation, Some((ViolationType::TooHot, Severity::Medium)));
        assert_eq!(evaluate(&p, 48.0).violation, Some((ViolationType::TooHot, Severity::High)));
        assert_eq!(evaluate(&p, 30.0).violation, Some((ViolationType::TooCold, Severity::Medium)));
        assert_eq!(evaluate(&p, 20.0).violation, Some((ViolationType::TooCold, Severity::High)));
    }

    #[test]
    fn due_checks() {
        let now = Utc::now();
        assert!(is_check_due(None, 4, now));
        assert!(is_check_due(Some(now - Duration::hours(5)), 4, now));
        assert!(!is_check_due(Some(now - Duration::hours(3)), 4, now));
    }

    #[test]
    fn out_of_range_frequency_is_never_due() {
        let now = Utc::now();
        assert!(!is_check_due(Some(now), i64::MAX, now));
        assert!(!is_check_due(Some(now - Duration::hours(1)), i64::MAX / 2, now));
        assert!(!CHECK_FREQUENCY_HOURS.contains(&0));
        assert!(CHECK_FREQUENCY_HOURS.contains(&24));
    }
}
