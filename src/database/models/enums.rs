use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgTypeInfo, PgValueRef};
use sqlx::Postgres;
use thiserror::Error;

use crate::filter::Scalar;

#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Closed TEXT-backed enumeration. Serializes to the stored text, decodes
/// from TEXT columns and binds as a text parameter.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: stringify!($name), value: other.to_string() }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, Postgres> for $name {
            fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let text = <&str as sqlx::Decode<Postgres>>::decode(value)?;
                Ok(text.parse::<$name>()?)
            }
        }

        impl From<$name> for Scalar {
            fn from(value: $name) -> Self {
                Scalar::Text(Some(value.as_str().to_string()))
            }
        }

        impl From<Option<$name>> for Scalar {
            fn from(value: Option<$name>) -> Self {
                Scalar::Text(value.map(|v| v.as_str().to_string()))
            }
        }
    };
}

text_enum!(Role {
    Admin => "admin",
    Manager => "manager",
    Staff => "staff",
});

text_enum!(EmployeeStatus {
    Active => "active",
    Inactive => "inactive",
    OnLeave => "on_leave",
    Terminated => "terminated",
});

text_enum!(TaskStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

text_enum!(ComplaintStatus {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

text_enum!(PreOrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    InProgress => "in_progress",
    Ready => "ready",
    Completed => "completed",
    Cancelled => "cancelled",
});

text_enum!(InventoryStatus {
    Pending => "pending",
    Approved => "approved",
    InProgress => "in_progress",
    Fulfilled => "fulfilled",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

text_enum!(EquipmentStatus {
    Operational => "operational",
    NeedsRepair => "needs_repair",
    UnderMaintenance => "under_maintenance",
    OutOfService => "out_of_service",
    Retired => "retired",
});

text_enum!(MaintenanceStatus {
    Scheduled => "scheduled",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

text_enum!(RepairStatus {
    Reported => "reported",
    Assigned => "assigned",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

text_enum!(ViolationType {
    TooCold => "too_cold",
    TooHot => "too_hot",
});

text_enum!(ViolationStatus {
    Open => "open",
    Acknowledged => "acknowledged",
    Resolved => "resolved",
});

text_enum!(TrainingRecordStatus {
    Completed => "completed",
    InProgress => "in_progress",
    Failed => "failed",
    Expired => "expired",
});

text_enum!(RequirementStatus {
    Pending => "pending",
    Completed => "completed",
    Overdue => "overdue",
    Waived => "waived",
});

text_enum!(Severity {
    Low => "low",
    Medium => "medium",
    High => "high",
});

text_enum!(Priority {
    Low => "low",
    Normal => "normal",
    High => "high",
});

text_enum!(ReminderPriority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

text_enum!(RepeatType {
    None => "none",
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

text_enum!(Urgency {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

/// Statuses that close a record's lifecycle and carry a completion stamp.
pub trait Terminal: Copy {
    fn is_terminal(&self) -> bool;
}

impl Terminal for TaskStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl Terminal for ComplaintStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, ComplaintStatus::Resolved | ComplaintStatus::Closed)
    }
}

impl Terminal for PreOrderStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, PreOrderStatus::Completed)
    }
}

impl Terminal for InventoryStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, InventoryStatus::Fulfilled)
    }
}

impl Terminal for MaintenanceStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, MaintenanceStatus::Completed)
    }
}

impl Terminal for RepairStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, RepairStatus::Completed)
    }
}

impl Terminal for ViolationStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, ViolationStatus::Resolved)
    }
}
