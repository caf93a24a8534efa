use sqlx::PgExecutor;

use crate::database::models::{Employee, EmployeeStatus};
use crate::database::{DatabaseError, Repository};
use crate::filter::{Filter, FilterOrderInfo, Predicate, SortDirection};

/// Picks a default assignee for work routed to a department.
pub struct AssignmentService;

impl AssignmentService {
    /// Active employees of the department whose position names a manager or lead.
    pub fn candidates(department_id: i64) -> Predicate {
        Predicate::all([
            Predicate::eq("department_id", department_id),
            Predicate::eq("status", EmployeeStatus::Active),
            Predicate::any([
                Predicate::ilike("position", "%manager%"),
                Predicate::ilike("position", "%lead%"),
            ]),
        ])
    }

    /// Lowest employee id among the candidates, if any.
    pub async fn default_assignee<'e, E: PgExecutor<'e>>(
        executor: E,
        department_id: Option<i64>,
    ) -> Result<Option<i64>, DatabaseError> {
        let Some(department_id) = department_id else {
            return Ok(None);
        };
        let mut filter = Filter::new("employees");
        filter
            .where_clause(Self::candidates(department_id))
            .order(Some(FilterOrderInfo { column: "id", sort: SortDirection::Asc }))
            .limit(1, None)
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let found = Repository::<Employee>::select_all(executor, &filter).await?;
        let assignee = found.first().map(|e| e.id);
        tracing::debug!(department_id, ?assignee, "auto-assignment lookup");
        Ok(assignee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn employee(department: Option<i64>, position: Option<&str>, status: EmployeeStatus) -> Employee {
        Employee {
            id: 1,
            employee_id: "E-001".into(),
            first_name: "Jo".into(),
            last_name: "Baker".into(),
            email: None,
            phone: None,
            department_id: department,
            position: position.map(String::from),
            status,
            hire_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn manager_and_lead_positions_qualify() {
        let p = AssignmentService::candidates(3);
        assert!(p.matches(&employee(Some(3), Some("Bakery Manager"), EmployeeStatus::Active)));
        assert!(p.matches(&employee(Some(3), Some("Shift LEAD"), EmployeeStatus::Active)));
        assert!(!p.matches(&employee(Some(3), Some("Cashier"), EmployeeStatus::Active)));
        assert!(!p.matches(&employee(Some(3), None, EmployeeStatus::Active)));
    }

    #[test]
    fn inactive_or_other_department_never_qualifies() {
        let p = AssignmentService::candidates(3);
        assert!(!p.matches(&employee(Some(3), Some("Manager"), EmployeeStatus::OnLeave)));
        assert!(!p.matches(&employee(Some(4), Some("Manager"), EmployeeStatus::Active)));
    }
}
