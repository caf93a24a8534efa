use axum::extract::State;
use axum::routing::{get, patch};
use axum::Router;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use sqlx::PgExecutor;
use serde::Deserialize;

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::database::models::{Reminder, ReminderPriority, RepeatType};
use crate::database::{Changeset, Repository};
use crate::error::{ApiError, ApiResult};
use crate::filter::{Filter, FilterOrderInfo, Predicate, SortDirection};
use crate::handlers::{days_param, paginate};
use crate::middleware::{message, Message};
use crate::policy::{Action, MutationGuard, Principal, Visibility};

const LIST: ListSpec = ListSpec {
    table: "reminders",
    sortable: &["id", "title", "reminder_date", "priority", "created_at", "updated_at"],
    searchable: &["title", "description"],
    default_sort: "reminder_date",
    default_order: SortDirection::Asc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/upcoming", get(upcoming))
        .route("/today", get(today))
        .route("/:id", get(show).put(update).delete(destroy))
        .route("/:id/complete", patch(complete))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReminderFilters {
    /// Defaults to open reminders only
    pub completed: Option<bool>,
    pub priority: Option<ReminderPriority>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReminderCreate {
    pub title: String,
    pub description: Option<String>,
    pub reminder_date: DateTime<Utc>,
    pub priority: Option<ReminderPriority>,
    pub is_completed: Option<bool>,
    pub repeat_type: Option<RepeatType>,
}

#[derive(Debug, Deserialize)]
pub struct ReminderUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub reminder_date: Option<DateTime<Utc>>,
    pub priority: Option<ReminderPriority>,
    pub is_completed: Option<bool>,
    pub repeat_type: Option<RepeatType>,
}

/// Open reminders of the principal falling in `[from, until)`.
fn open_between(principal: &Principal, from: DateTime<Utc>, until: DateTime<Utc>) -> Filter {
    let mut filter = Filter::new("reminders");
    filter
        .where_clause(Predicate::all([
            Reminder::scope(principal),
            Predicate::eq("is_completed", false),
            Predicate::gte("reminder_date", from),
            Predicate::lt("reminder_date", until),
        ]))
        .order(Some(FilterOrderInfo { column: "reminder_date", sort: SortDirection::Asc }));
    filter
}

/// `[now, now + days)`, a week by default.
fn upcoming_window(now: DateTime<Utc>, days: Option<i64>) -> ApiResult<(DateTime<Utc>, DateTime<Utc>)> {
    let span = days_param(days, 7, "days")?;
    let until = now
        .checked_add_signed(span)
        .ok_or_else(|| ApiError::bad_request("days is out of range"))?;
    Ok((now, until))
}

/// Loads a reminder the principal owns; anyone else's reads as missing.
async fn owned<'e, E: PgExecutor<'e>>(executor: E, principal: &Principal, id: i64) -> ApiResult<Reminder> {
    let reminder = Repository::<Reminder>::find(executor, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Reminder not found"))?;
    reminder.ensure_visible(principal)?;
    Ok(reminder)
}

/// GET /reminders
pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
    Query(filters): Query<ReminderFilters>,
) -> ApiResult<Json<Page<Reminder>>> {
    let predicate = Predicate::all([
        Reminder::scope(&principal),
        Predicate::eq("is_completed", filters.completed.unwrap_or(false)),
        Predicate::eq_if("priority", filters.priority),
    ]);
    paginate(&state.pool, &LIST, &params, predicate).await
}

/// GET /reminders/upcoming?days=7
pub async fn upcoming(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<UpcomingQuery>,
) -> ApiResult<Json<Vec<Reminder>>> {
    let (from, until) = upcoming_window(Utc::now(), query.days)?;
    let filter = open_between(&principal, from, until);
    Ok(Json(Repository::<Reminder>::select_all(&state.pool, &filter).await?))
}

/// GET /reminders/today, by the UTC calendar day
pub async fn today(State(state): State<AppState>, principal: Principal) -> ApiResult<Json<Vec<Reminder>>> {
    let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    let filter = open_between(&principal, midnight, midnight + Duration::days(1));
    Ok(Json(Repository::<Reminder>::select_all(&state.pool, &filter).await?))
}

/// GET /reminders/:id
pub async fn show(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Reminder>> {
    Ok(Json(owned(&state.pool, &principal, id).await?))
}

/// POST /reminders. Always owned by the caller.
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<ReminderCreate>,
) -> ApiResult<Json<Reminder>> {
    let mut tx = state.pool.begin().await?;
    let changes = Changeset::new()
        .set("user_id", principal.id)
        .set("title", input.title)
        .set_opt("description", input.description)
        .set("reminder_date", input.reminder_date)
        .set_opt("priority", input.priority)
        .set_opt("is_completed", input.is_completed)
        .set_opt("repeat_type", input.repeat_type);
    let reminder = Repository::<Reminder>::insert(&mut *tx, changes).await?;
    tx.commit().await?;
    Ok(Json(reminder))
}

/// PUT /reminders/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<ReminderUpdate>,
) -> ApiResult<Json<Reminder>> {
    let mut tx = state.pool.begin().await?;
    owned(&mut *tx, &principal, id).await?.authorize(&principal, Action::Update)?;
    let changes = Changeset::new()
        .set_opt("title", input.title)
        .set_opt("description", input.description)
        .set_opt("reminder_date", input.reminder_date)
        .set_opt("priority", input.priority)
        .set_opt("is_completed", input.is_completed)
        .set_opt("repeat_type", input.repeat_type);
    let reminder = Repository::<Reminder>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(reminder))
}

/// PATCH /reminders/:id/complete
pub async fn complete(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Reminder>> {
    let mut tx = state.pool.begin().await?;
    owned(&mut *tx, &principal, id).await?.authorize(&principal, Action::Update)?;
    let reminder = Repository::<Reminder>::update(&mut *tx, id, Changeset::new().set("is_completed", true)).await?;
    tx.commit().await?;
    Ok(Json(reminder))
}

/// DELETE /reminders/:id
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    let mut tx = state.pool.begin().await?;
    owned(&mut *tx, &principal, id).await?.authorize(&principal, Action::Delete)?;
    Repository::<Reminder>::delete(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(message("Reminder deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Role;
    use crate::policy::PolicyError;

    fn reminder(user_id: i64) -> Reminder {
        let now = Utc::now();
        Reminder {
            id: 9,
            user_id,
            title: "Order flour".to_string(),
            description: None,
            reminder_date: now,
            priority: ReminderPriority::Medium,
            is_completed: false,
            repeat_type: RepeatType::None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn foreign_reminder_reads_as_missing() {
        let admin = Principal::fixture(Role::Admin, None, None);
        let err = reminder(admin.id + 1).ensure_visible(&admin).unwrap_err();
        assert!(matches!(err, PolicyError::Hidden(ref m) if m == "Reminder not found"));
        assert!(reminder(admin.id).ensure_visible(&admin).is_ok());
    }

    #[test]
    fn upcoming_window_rejects_unrepresentable_days() {
        let now = Utc::now();
        let (from, until) = upcoming_window(now, None).unwrap();
        assert_eq!((from, until), (now, now + Duration::days(7)));
        assert!(upcoming_window(now, Some(-1)).is_err());
        assert!(upcoming_window(now, Some(1_000_000_000_000)).is_err());
        assert!(upcoming_window(now, Some(200_000_000)).is_err());
    }

    #[test]
    fn window_is_scoped_to_owner() {
        let staff = Principal::fixture(Role::Staff, Some(1), Some(2));
        let now = Utc::now();
        let filter = open_between(&staff, now, now + Duration::days(1));
        let sql = filter.to_sql();
        assert!(sql.query.contains("\"user_id\" = $1"));
        assert!(sql.query.ends_with("ORDER BY \"reminder_date\" ASC"));
        assert_eq!(sql.params.len(), 4);
    }
}
