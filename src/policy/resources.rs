use chrono::{DateTime, Utc};

use crate::database::models::{
    Announcement, Complaint, Department, Employee, Equipment, EquipmentMaintenance, EquipmentRepair, InventoryRequest,
    PreOrder, Reminder, Severity, Task, TrainingRecord, TrainingRequirement, User,
};
use crate::filter::Predicate;

use super::{DenyMode, MutationGuard, Principal, Visibility};

pub fn complaint_scope(p: &Principal) -> Predicate {
    if p.is_admin() {
        return Predicate::Always;
    }
    let same_department = Predicate::eq_opt("department_involved", p.department_id);
    if p.is_manager() {
        return same_department;
    }
    Predicate::all([
        same_department,
        Predicate::ne("severity", Severity::High),
        Predicate::ne("is_private", true),
    ])
}

pub fn preorder_scope(p: &Principal) -> Predicate {
    if p.is_admin() {
        return Predicate::Always;
    }
    let same_department = Predicate::eq_opt("target_department", p.department_id);
    if p.is_manager() {
        return same_department;
    }
    Predicate::all([same_department, Predicate::eq_opt("assigned_to", p.employee_id)])
}

/// Unexpired, aimed at the principal's department (admins see every
/// department) and at the principal's role.
pub fn announcement_scope(p: &Principal, now: DateTime<Utc>) -> Predicate {
    let department = if p.is_admin() {
        Predicate::Always
    } else {
        Predicate::any([
            Predicate::is_null("target_department"),
            Predicate::eq_opt("target_department", p.department_id),
        ])
    };
    Predicate::all([
        Predicate::any([Predicate::is_null("expires_at"), Predicate::gt("expires_at", now)]),
        department,
        Predicate::any([
            Predicate::is_null("target_roles"),
            Predicate::contains("target_roles", p.role),
        ]),
    ])
}

fn own_employee_rows(p: &Principal) -> Predicate {
    if p.is_admin_or_manager() {
        Predicate::Always
    } else {
        Predicate::eq_opt("employee_id", p.employee_id)
    }
}

impl Visibility for Complaint {
    const HIDDEN_MESSAGE: &'static str = "Not authorized to view this complaint";

    fn scope(principal: &Principal) -> Predicate {
        complaint_scope(principal)
    }
}

impl Visibility for PreOrder {
    const HIDDEN_MESSAGE: &'static str = "Not authorized to view this pre-order";

    fn scope(principal: &Principal) -> Predicate {
        preorder_scope(principal)
    }
}

impl Visibility for Announcement {
    const HIDDEN_MESSAGE: &'static str = "Not authorized to view this announcement";

    fn scope(principal: &Principal) -> Predicate {
        announcement_scope(principal, Utc::now())
    }
}

impl Visibility for User {
    const HIDDEN_MESSAGE: &'static str = "Not authorized to view this user";

    fn scope(principal: &Principal) -> Predicate {
        if principal.is_admin_or_manager() {
            Predicate::Always
        } else {
            Predicate::eq("id", principal.id)
        }
    }
}

impl Visibility for Reminder {
    const DENY: DenyMode = DenyMode::NotFound;
    const HIDDEN_MESSAGE: &'static str = "Reminder not found";

    fn scope(principal: &Principal) -> Predicate {
        Predicate::eq("user_id", principal.id)
    }
}

impl Visibility for TrainingRecord {
    const HIDDEN_MESSAGE: &'static str = "Not authorized to view this training record";

    fn scope(principal: &Principal) -> Predicate {
        own_employee_rows(principal)
    }
}

impl Visibility for TrainingRequirement {
    const HIDDEN_MESSAGE: &'static str = "Not authorized to view this training requirement";

    fn scope(principal: &Principal) -> Predicate {
        own_employee_rows(principal)
    }
}

pub fn may_create_employee(p: &Principal, department_id: Option<i64>) -> bool {
    p.is_admin() || p.manages(department_id)
}

pub fn may_create_equipment(p: &Principal, department_id: Option<i64>) -> bool {
    p.is_admin() || p.manages(department_id)
}

impl MutationGuard for Department {
    const NOUN: &'static str = "department";

    fn may_update(&self, p: &Principal) -> bool {
        p.is_admin() || p.manages(Some(self.id))
    }

    fn may_delete(&self, p: &Principal) -> bool {
        p.is_admin()
    }
}

impl MutationGuard for Employee {
    const NOUN: &'static str = "employee";

    fn may_update(&self, p: &Principal) -> bool {
        p.is_admin() || p.manages(self.department_id)
    }

    fn may_delete(&self, p: &Principal) -> bool {
        p.is_admin()
    }
}

impl MutationGuard for User {
    const NOUN: &'static str = "user";

    fn may_update(&self, p: &Principal) -> bool {
        p.is_admin() || p.id == self.id
    }

    fn may_delete(&self, p: &Principal) -> bool {
        p.is_admin()
    }
}

impl MutationGuard for Task {
    const NOUN: &'static str = "task";

    fn may_update(&self, p: &Principal) -> bool {
        p.is_admin()
            || p.manages(self.department_id)
            || p.manages(self.assigned_to_department)
            || p.is_employee(self.assigned_to)
            || p.is_employee(self.assigned_by)
    }

    fn may_delete(&self, p: &Principal) -> bool {
        p.is_admin() || p.manages(self.department_id) || p.is_employee(self.assigned_by)
    }
}

impl MutationGuard for Complaint {
    const NOUN: &'static str = "complaint";

    fn may_update(&self, p: &Principal) -> bool {
        p.is_admin()
            || p.manages(self.department_involved)
            || p.is_employee(self.reported_by)
            || p.is_employee(self.assigned_to)
    }

    fn may_delete(&self, p: &Principal) -> bool {
        p.is_admin() || p.manages(self.department_involved)
    }
}

impl MutationGuard for PreOrder {
    const NOUN: &'static str = "pre-order";

    fn may_update(&self, p: &Principal) -> bool {
        p.is_admin()
            || p.manages(self.target_department)
            || p.is_employee(self.requested_by)
            || p.is_employee(self.assigned_to)
    }

    fn may_delete(&self, p: &Principal) -> bool {
        p.is_admin() || p.manages(self.target_department)
    }
}

impl MutationGuard for InventoryRequest {
    const NOUN: &'static str = "inventory request";

    fn may_update(&self, p: &Principal) -> bool {
        p.is_admin()
            || p.manages(self.requesting_department)
            || p.manages(self.fulfilling_department)
            || p.is_employee(self.requested_by)
            || p.is_employee(self.assigned_to)
    }

    fn may_delete(&self, p: &Principal) -> bool {
        p.is_admin() || p.manages(self.requesting_department)
    }
}

impl MutationGuard for Equipment {
    const NOUN: &'static str = "equipment";

    fn may_update(&self, p: &Principal) -> bool {
        p.is_admin() || p.manages(self.department_id)
    }

    fn may_delete(&self, p: &Principal) -> bool {
        p.is_admin()
    }
}

impl MutationGuard for EquipmentMaintenance {
    const NOUN: &'static str = "maintenance record";

    fn may_update(&self, p: &Principal) -> bool {
        p.is_admin_or_manager() || p.is_employee(self.performed_by)
    }

    fn may_delete(&self, p: &Principal) -> bool {
        p.is_admin_or_manager()
    }
}

impl MutationGuard for EquipmentRepair {
    const NOUN: &'static str = "repair request";

    fn may_update(&self, p: &Principal) -> bool {
        p.is_admin_or_manager() || p.is_employee(self.reported_by) || p.is_employee(self.assigned_to)
    }

    fn may_delete(&self, p: &Principal) -> bool {
        p.is_admin_or_manager()
    }
}

impl MutationGuard for Reminder {
    const NOUN: &'static str = "reminder";

    fn may_update(&self, p: &Principal) -> bool {
        self.user_id == p.id
    }

    fn may_delete(&self, p: &Principal) -> bool {
        self.user_id == p.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{ComplaintStatus, PreOrderStatus, Priority, Role};
    use crate::filter::FilterWhere;
    use crate::policy::{Action, PolicyError};
    use chrono::Duration;

    fn complaint(department: Option<i64>, severity: Severity, is_private: bool) -> Complaint {
        Complaint {
            id: 1,
            customer_name: Some("Pat".into()),
            customer_email: None,
            customer_phone: None,
            complaint_type: "service".into(),
            description: "Slow checkout".into(),
            department_involved: department,
            reported_by: None,
            assigned_to: None,
            severity,
            status: ComplaintStatus::Open,
            resolution: None,
            is_private,
            resolved_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn preorder(target: Option<i64>, assigned_to: Option<i64>) -> PreOrder {
        PreOrder {
            id: 1,
            customer_name: "Sam".into(),
            customer_email: None,
            customer_phone: None,
            order_type: "cake".into(),
            description: "Birthday cake".into(),
            target_department: target,
            requested_by: None,
            assigned_to,
            quantity: Some(1),
            estimated_price: Some(35.0),
            pickup_date: None,
            special_instructions: None,
            status: PreOrderStatus::Pending,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn announcement(
        target_department: Option<i64>,
        expires_at: Option<DateTime<Utc>>,
        target_roles: Option<Vec<&str>>,
    ) -> Announcement {
        Announcement {
            id: 1,
            title: "Inventory count".into(),
            message: "Saturday night".into(),
            announcement_type: Some("general".into()),
            target_department,
            created_by: None,
            priority: Priority::Normal,
            is_active: true,
            expires_at,
            target_roles: target_roles.map(|r| r.into_iter().map(String::from).collect()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn department(id: i64, name: &str) -> Department {
        Department {
            id,
            name: name.into(),
            department_code: None,
            description: None,
            manager_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// The listing rule stated directly over the record's fields.
    fn complaint_listable(p: &Principal, c: &Complaint) -> bool {
        let same = p.in_department(c.department_involved);
        p.is_admin() || (p.is_manager() && same) || (same && c.severity != Severity::High && !c.is_private)
    }

    #[test]
    fn complaint_visibility_matches_rule_for_every_combination() {
        let departments = [None, Some(1), Some(2)];
        let roles = [Role::Admin, Role::Manager, Role::Staff];
        let severities = [Severity::Low, Severity::Medium, Severity::High];
        for role in roles {
            for principal_dept in departments {
                let p = Principal::fixture(role, principal_dept, Some(7));
                for record_dept in departments {
                    for severity in severities {
                        for is_private in [false, true] {
                            let c = complaint(record_dept, severity, is_private);
                            assert_eq!(
                                c.can_view(&p),
                                complaint_listable(&p, &c),
                                "{:?} dept {:?} vs record dept {:?} {:?} private={}",
                                role,
                                principal_dept,
                                record_dept,
                                severity,
                                is_private
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn staff_complaint_scope_compiles_to_sql() {
        let p = Principal::fixture(Role::Staff, Some(3), Some(7));
        let (sql, params) = FilterWhere::generate(&complaint_scope(&p), 0);
        assert_eq!(sql, "(\"department_involved\" = $1) AND (\"severity\" <> $2) AND (\"is_private\" <> $3)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn complaint_without_department_principal_sees_nothing() {
        let p = Principal::fixture(Role::Staff, None, Some(7));
        assert_eq!(complaint_scope(&p), Predicate::Never);
        assert!(!complaint(None, Severity::Low, false).can_view(&p));
    }

    #[test]
    fn hidden_complaint_detail_is_forbidden() {
        let p = Principal::fixture(Role::Staff, Some(1), Some(7));
        let err = complaint(Some(1), Severity::High, false).ensure_visible(&p).unwrap_err();
        assert!(matches!(err, PolicyError::Forbidden(_)));
    }

    #[test]
    fn preorder_staff_sees_only_own_assignments() {
        let staff = Principal::fixture(Role::Staff, Some(2), Some(9));
        assert!(preorder(Some(2), Some(9)).can_view(&staff));
        assert!(!preorder(Some(2), Some(10)).can_view(&staff));
        assert!(!preorder(Some(2), None).can_view(&staff));
        assert!(!preorder(Some(3), Some(9)).can_view(&staff));

        let manager = Principal::fixture(Role::Manager, Some(2), None);
        assert!(preorder(Some(2), None).can_view(&manager));
        assert!(!preorder(None, None).can_view(&manager));
    }

    #[test]
    fn announcement_visibility() {
        let now = Utc::now();
        let staff = Principal::fixture(Role::Staff, Some(4), Some(1));
        let admin = Principal::fixture(Role::Admin, None, None);
        let visible = |a: &Announcement, p: &Principal| announcement_scope(p, now).matches(a);

        assert!(visible(&announcement(None, None, None), &staff));
        assert!(visible(&announcement(Some(4), Some(now + Duration::days(1)), None), &staff));
        assert!(!visible(&announcement(Some(4), Some(now - Duration::days(1)), None), &staff));
        assert!(!visible(&announcement(Some(5), None, None), &staff));
        assert!(visible(&announcement(Some(5), None, None), &admin));
        assert!(visible(&announcement(None, None, Some(vec!["staff", "manager"])), &staff));
        assert!(!visible(&announcement(None, None, Some(vec!["manager"])), &staff));
        assert!(!visible(&announcement(None, None, Some(vec!["manager"])), &admin));
    }

    #[test]
    fn reminders_of_others_look_missing() {
        let owner = Principal::fixture(Role::Staff, None, None);
        let reminder = Reminder {
            id: 1,
            user_id: owner.id + 1,
            title: "Order flour".into(),
            description: None,
            reminder_date: Utc::now(),
            priority: crate::database::models::ReminderPriority::Medium,
            is_completed: false,
            repeat_type: crate::database::models::RepeatType::None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(reminder.ensure_visible(&owner), Err(PolicyError::Hidden(_))));
    }

    #[test]
    fn bakery_department_guards() {
        let bakery = department(10, "Bakery");
        let admin = Principal::fixture(Role::Admin, None, None);
        let other_manager = Principal::fixture(Role::Manager, Some(11), Some(3));
        let bakery_manager = Principal::fixture(Role::Manager, Some(10), Some(4));

        assert!(bakery.authorize(&admin, Action::Delete).is_ok());
        let err = bakery.authorize(&other_manager, Action::Delete).unwrap_err();
        assert_eq!(err.to_string(), "You do not have permission to delete this department");
        assert!(bakery.authorize(&bakery_manager, Action::Update).is_ok());
        assert!(bakery.authorize(&bakery_manager, Action::Delete).is_err());
        assert!(bakery.authorize(&other_manager, Action::Update).is_err());
    }

    #[test]
    fn complaint_delete_is_stricter_than_update() {
        let reporter = Principal::fixture(Role::Staff, Some(1), Some(7));
        let mut c = complaint(Some(1), Severity::Low, false);
        c.reported_by = Some(7);
        assert!(c.authorize(&reporter, Action::Update).is_ok());
        assert!(c.authorize(&reporter, Action::Delete).is_err());
        let manager = Principal::fixture(Role::Manager, Some(1), Some(8));
        assert!(c.authorize(&manager, Action::Delete).is_ok());
    }

    #[test]
    fn employee_creation_limited_to_own_department_for_managers() {
        let manager = Principal::fixture(Role::Manager, Some(1), Some(8));
        assert!(may_create_employee(&manager, Some(1)));
        assert!(!may_create_employee(&manager, Some(2)));
        assert!(!may_create_employee(&manager, None));
        let staff = Principal::fixture(Role::Staff, Some(1), Some(9));
        assert!(!may_create_employee(&staff, Some(1)));
    }
}
