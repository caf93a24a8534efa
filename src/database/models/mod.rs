pub mod enums;

mod announcement;
mod department;
mod employee;
mod equipment;
mod inventory;
mod permission;
mod preorder;
mod reminder;
mod task;
mod temperature;
mod training;
mod complaint;
mod user;

pub use announcement::{Announcement, AnnouncementRead};
pub use complaint::Complaint;
pub use department::Department;
pub use employee::Employee;
pub use enums::*;
pub use equipment::{Equipment, EquipmentMaintenance, EquipmentRepair};
pub use inventory::{InventoryRequest, InventoryRequestUpdate};
pub use permission::{Permission, RolePermission};
pub use preorder::PreOrder;
pub use reminder::Reminder;
pub use task::Task;
pub use temperature::{MonitoringPoint, TemperatureLog, TemperatureViolation};
pub use training::{TrainingRecord, TrainingRequirement, TrainingType};
pub use user::User;

/// Binds a model to its table for the generic repository.
macro_rules! table {
    ($model:ty, $table:literal, $label:literal) => {
        impl $crate::database::repository::Table for $model {
            const TABLE: &'static str = $table;
            const LABEL: &'static str = $label;
        }
    };
    ($model:ty, $table:literal, $label:literal, append_only) => {
        impl $crate::database::repository::Table for $model {
            const TABLE: &'static str = $table;
            const LABEL: &'static str = $label;
            const TOUCHES_UPDATED_AT: bool = false;
        }
    };
}

pub(crate) use table;
