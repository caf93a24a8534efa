//! Access policy: who may see and who may change each kind of record.
//!
//! Visibility is a [`Predicate`] built from the principal. List endpoints
//! compile it into their WHERE clause; detail and mutation endpoints evaluate
//! the very same value against the loaded row, so a record is reachable by id
//! exactly when it would appear in the list.

use serde::Serialize;
use thiserror::Error;

use crate::filter::Predicate;

mod principal;
mod resources;

pub use principal::Principal;
pub use resources::{announcement_scope, complaint_scope, may_create_employee, may_create_equipment, preorder_scope};

#[derive(Debug, Error)]
pub enum PolicyError {
    /// 403
    #[error("{0}")]
    Forbidden(String),

    /// Reported as a missing record (404)
    #[error("{0}")]
    Hidden(String),

    /// The request itself is not acceptable (400)
    #[error("{0}")]
    Invalid(String),
}

/// How a record the principal may not see is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyMode {
    Forbidden,
    NotFound,
}

pub trait Visibility: Serialize + Sized {
    const DENY: DenyMode = DenyMode::Forbidden;
    const HIDDEN_MESSAGE: &'static str = "Not authorized to view this record";

    fn scope(principal: &Principal) -> Predicate;

    fn can_view(&self, principal: &Principal) -> bool {
        Self::scope(principal).matches(self)
    }

    fn ensure_visible(&self, principal: &Principal) -> Result<(), PolicyError> {
        if self.can_view(principal) {
            return Ok(());
        }
        tracing::debug!(user = %principal.username, "record hidden by visibility scope");
        Err(match Self::DENY {
            DenyMode::Forbidden => PolicyError::Forbidden(Self::HIDDEN_MESSAGE.to_string()),
            DenyMode::NotFound => PolicyError::Hidden(Self::HIDDEN_MESSAGE.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Update,
    Delete,
}

impl Action {
    fn verb(&self) -> &'static str {
        match self {
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// Per-record write rules. Creation rules depend on the proposed values
/// rather than a stored row and live next to the resource's handlers.
pub trait MutationGuard {
    const NOUN: &'static str;

    fn may_update(&self, principal: &Principal) -> bool;

    fn may_delete(&self, principal: &Principal) -> bool;

    fn authorize(&self, principal: &Principal, action: Action) -> Result<(), PolicyError> {
        let allowed = match action {
            Action::Update => self.may_update(principal),
            Action::Delete => self.may_delete(principal),
        };
        if allowed {
            Ok(())
        } else {
            tracing::debug!(user = %principal.username, ?action, noun = Self::NOUN, "mutation denied");
            Err(PolicyError::Forbidden(format!(
                "You do not have permission to {} this {}",
                action.verb(),
                Self::NOUN
            )))
        }
    }
}

pub fn require(allowed: bool, message: &str) -> Result<(), PolicyError> {
    if allowed {
        Ok(())
    } else {
        Err(PolicyError::Forbidden(message.to_string()))
    }
}
