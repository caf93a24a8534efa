use chrono::{Datelike, Duration, NaiveDate};

use crate::database::models::{EmployeeStatus, TrainingType};
use crate::filter::{Predicate, Scalar};

/// Days a newly required training may remain outstanding
pub const REQUIREMENT_GRACE_DAYS: i64 = 30;

/// Accepted `validity_period_months`, up to a century
pub const VALIDITY_MONTHS: std::ops::RangeInclusive<i64> = 1..=1200;

/// `completed + months`, with the day of month clamped to 28 so every month
/// has it. `None` when the result is not a representable date.
pub fn expiration_from(completed: NaiveDate, validity_months: i64) -> Option<NaiveDate> {
    let months_since_epoch = (completed.year() as i64 * 12 + completed.month0() as i64).checked_add(validity_months)?;
    let year = i32::try_from(months_since_epoch.div_euclid(12)).ok()?;
    let month = months_since_epoch.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, completed.day().min(28))
}

/// Explicit expiration wins; otherwise derived from the type's validity period.
pub fn resolve_expiration(
    explicit: Option<NaiveDate>,
    completed: NaiveDate,
    validity_months: Option<i64>,
) -> Option<NaiveDate> {
    explicit.or_else(|| validity_months.and_then(|m| expiration_from(completed, m)))
}

pub fn requirement_due(today: NaiveDate) -> NaiveDate {
    today + Duration::days(REQUIREMENT_GRACE_DAYS)
}

/// Active employees a mandatory type applies to, by department or position.
/// `None` when the type is optional or targets nobody.
pub fn required_employees(training: &TrainingType) -> Option<Predicate> {
    if !training.is_mandatory {
        return None;
    }
    let mut targets = Vec::new();
    if !training.required_for_departments.is_empty() {
        targets.push(Predicate::one_of(
            "department_id",
            training.required_for_departments.iter().map(|d| Scalar::from(*d)).collect(),
        ));
    }
    if !training.required_for_positions.is_empty() {
        targets.push(Predicate::one_of(
            "position",
            training.required_for_positions.iter().map(|p| Scalar::from(p.as_str())).collect(),
        ));
    }
    if targets.is_empty() {
        return None;
    }
    Some(Predicate::all([
        Predicate::eq("status", EmployeeStatus::Active),
        Predicate::any(targets),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn adds_months_across_year_end() {
        assert_eq!(expiration_from(date(2025, 11, 15), 3), Some(date(2026, 2, 15)));
        assert_eq!(expiration_from(date(2025, 1, 10), 12), Some(date(2026, 1, 10)));
    }

    #[test]
    fn clamps_day_to_28() {
        assert_eq!(expiration_from(date(2026, 1, 31), 1), Some(date(2026, 2, 28)));
        assert_eq!(expiration_from(date(2026, 3, 30), 6), Some(date(2026, 9, 28)));
    }

    #[test]
    fn unrepresentable_expiration_is_none() {
        assert_eq!(expiration_from(date(2026, 1, 1), i64::MAX), None);
        assert_eq!(expiration_from(date(2026, 1, 1), i64::MAX / 2), None);
        assert!(!VALIDITY_MONTHS.contains(&0));
        assert!(VALIDITY_MONTHS.contains(&12));
    }

    #[test]
    fn explicit_expiration_wins() {
        let explicit = date(2027, 1, 1);
        assert_eq!(resolve_expiration(Some(explicit), date(2026, 1, 1), Some(12)), Some(explicit));
        assert_eq!(resolve_expiration(None, date(2026, 1, 1), None), None);
    }

    #[test]
    fn requirement_due_in_thirty_days() {
        assert_eq!(requirement_due(date(2026, 10, 14)), date(2026, 11, 13));
    }

    #[test]
    fn only_mandatory_targeted_types_fan_out() {
        let mut t = TrainingType {
            id: 1,
            training_name: "Food safety".into(),
            description: None,
            required_for_departments: vec![1, 2],
            required_for_positions: vec![],
            validity_period_months: Some(12),
            is_mandatory: false,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(required_employees(&t).is_none());
        t.is_mandatory = true;
        assert!(required_employees(&t).is_some());
        t.required_for_departments.clear();
        assert!(required_employees(&t).is_none());
    }
}
