pub mod extract;
pub mod listing;

pub use extract::{Form, Json, Path, Query};
pub use listing::{ListParams, ListQuery, ListSpec, Page};
