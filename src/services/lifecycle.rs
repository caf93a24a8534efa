use chrono::{DateTime, NaiveDate, Utc};

use crate::database::models::Terminal;
use crate::database::Changeset;
use crate::filter::Scalar;

/// What a status change does to the record's completion stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    Set,
    Clear,
    Keep,
}

/// Only the edge into a terminal status sets the stamp; leaving one clears
/// it. `from` is `None` when the record is being created.
pub fn transition<S: Terminal>(from: Option<S>, to: S) -> Stamp {
    let was_terminal = from.map(|s| s.is_terminal()).unwrap_or(false);
    match (was_terminal, to.is_terminal()) {
        (false, true) => Stamp::Set,
        (true, false) => Stamp::Clear,
        _ => Stamp::Keep,
    }
}

impl Stamp {
    pub fn apply_time(self, changes: Changeset, column: &'static str, now: DateTime<Utc>) -> Changeset {
        match self {
            Stamp::Set => changes.set(column, now),
            Stamp::Clear => changes.set(column, Scalar::Time(None)),
            Stamp::Keep => changes,
        }
    }

    pub fn apply_date(self, changes: Changeset, column: &'static str, today: NaiveDate) -> Changeset {
        match self {
            Stamp::Set => changes.set(column, today),
            Stamp::Clear => changes.set(column, Scalar::Date(None)),
            Stamp::Keep => changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{ComplaintStatus, TaskStatus};

    #[test]
    fn entering_terminal_sets_once() {
        assert_eq!(transition(Some(ComplaintStatus::Open), ComplaintStatus::Resolved), Stamp::Set);
        assert_eq!(transition(Some(ComplaintStatus::Resolved), ComplaintStatus::Closed), Stamp::Keep);
        assert_eq!(transition(Some(ComplaintStatus::Resolved), ComplaintStatus::Resolved), Stamp::Keep);
    }

    #[test]
    fn leaving_terminal_clears() {
        assert_eq!(transition(Some(TaskStatus::Completed), TaskStatus::InProgress), Stamp::Clear);
        assert_eq!(transition(Some(TaskStatus::Pending), TaskStatus::InProgress), Stamp::Keep);
    }

    #[test]
    fn creating_in_terminal_status_stamps() {
        assert_eq!(transition(None, TaskStatus::Completed), Stamp::Set);
        assert_eq!(transition(None, TaskStatus::Pending), Stamp::Keep);
    }

    #[test]
    fn clear_binds_typed_null() {
        let changes = Stamp::Clear.apply_time(Changeset::new(), "resolved_at", Utc::now());
        assert_eq!(changes.into_params(), vec![Scalar::Time(None)]);
        assert!(Stamp::Keep.apply_date(Changeset::new(), "completed_date", Utc::now().date_naive()).is_empty());
    }
}
