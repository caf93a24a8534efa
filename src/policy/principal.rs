use crate::database::models::{Role, User};

use super::{require, PolicyError};

/// The authenticated caller, loaded from the users table on every request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub employee_id: Option<i64>,
    pub department_id: Option<i64>,
    pub is_active: bool,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            employee_id: user.employee_id,
            department_id: user.department_id,
            is_active: user.is_active,
        }
    }
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }

    pub fn is_admin_or_manager(&self) -> bool {
        self.is_admin() || self.is_manager()
    }

    /// Manager of the given department. A missing department on either side
    /// never matches.
    pub fn manages(&self, department_id: Option<i64>) -> bool {
        self.is_manager() && self.in_department(department_id)
    }

    pub fn in_department(&self, department_id: Option<i64>) -> bool {
        matches!((self.department_id, department_id), (Some(mine), Some(theirs)) if mine == theirs)
    }

    /// The principal's linked employee is the given one.
    pub fn is_employee(&self, employee_id: Option<i64>) -> bool {
        matches!((self.employee_id, employee_id), (Some(mine), Some(theirs)) if mine == theirs)
    }

    pub fn require_admin(&self) -> Result<(), PolicyError> {
        require(self.is_admin(), "This operation requires admin privileges")
    }

    pub fn require_admin_or_manager(&self) -> Result<(), PolicyError> {
        require(self.is_admin_or_manager(), "This operation requires manager or admin privileges")
    }

    /// The linked employee id, for endpoints that act on the caller's behalf.
    pub fn require_employee(&self) -> Result<i64, PolicyError> {
        self.employee_id
            .ok_or_else(|| PolicyError::Invalid("Current user is not associated with an employee".to_string()))
    }
}

#[cfg(test)]
impl Principal {
    pub fn fixture(role: Role, department_id: Option<i64>, employee_id: Option<i64>) -> Self {
        Self {
            id: 100,
            username: format!("{}-fixture", role),
            role,
            employee_id,
            department_id,
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn department_match_requires_both_sides() {
        let p = Principal::fixture(Role::Manager, None, None);
        assert!(!p.manages(None));
        assert!(!p.manages(Some(1)));
        let p = Principal::fixture(Role::Manager, Some(1), None);
        assert!(p.manages(Some(1)));
        assert!(!p.manages(Some(2)));
    }

    #[test]
    fn staff_never_manages() {
        let p = Principal::fixture(Role::Staff, Some(1), Some(5));
        assert!(!p.manages(Some(1)));
        assert!(p.in_department(Some(1)));
        assert!(p.is_employee(Some(5)));
        assert!(!p.is_employee(None));
    }
}
