use chrono::{Months, NaiveDate};

/// Maintenance performed on a schedule and so followed by the next due date
pub const REGULAR: &str = "regular";

/// Next due date after regular maintenance, by equipment type.
pub fn next_due(equipment_type: &str, completed: NaiveDate) -> Option<NaiveDate> {
    let months = match equipment_type {
        "refrigeration" => 3,
        "heating" => 6,
        _ => 12,
    };
    completed.checked_add_months(Months::new(months))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn intervals_by_type() {
        let done = date(2026, 1, 15);
        assert_eq!(next_due("refrigeration", done), Some(date(2026, 4, 15)));
        assert_eq!(next_due("heating", done), Some(date(2026, 7, 15)));
        assert_eq!(next_due("oven", done), Some(date(2027, 1, 15)));
    }

    #[test]
    fn month_end_clamps() {
        assert_eq!(next_due("refrigeration", date(2026, 11, 30)), Some(date(2027, 2, 28)));
    }
}
