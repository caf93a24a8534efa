pub mod assignment;
pub mod lifecycle;
pub mod maintenance;
pub mod temperature;
pub mod training;

pub use assignment::AssignmentService;
pub use lifecycle::{transition, Stamp};
