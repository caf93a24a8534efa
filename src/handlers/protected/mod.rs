use axum::Router;

use crate::app::AppState;

pub mod announcements;
pub mod auth;
pub mod complaints;
pub mod departments;
pub mod employees;
pub mod equipment;
pub mod inventory;
pub mod permissions;
pub mod preorders;
pub mod reminders;
pub mod tasks;
pub mod temperature;
pub mod training;
pub mod users;

/// Every route that requires an authenticated principal.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/users", users::routes())
        .nest("/departments", departments::routes())
        .nest("/employees", employees::routes())
        .nest("/tasks", tasks::routes())
        .nest("/complaints", complaints::routes())
        .nest("/preorders", preorders::routes())
        .nest("/inventory", inventory::routes())
        .nest("/equipment", equipment::routes())
        .nest("/temperature", temperature::routes())
        .nest("/training", training::routes())
        .nest("/announcements", announcements::routes())
        .nest("/reminders", reminders::routes())
        .nest("/permissions", permissions::routes())
}
