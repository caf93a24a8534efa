use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::api::{Json, ListParams, ListSpec, Page, Path, Query};
use crate::app::AppState;
use crate::database::models::{Announcement, AnnouncementRead, Department, Employee, EmployeeStatus, Priority, User};
use crate::database::{Changeset, DatabaseError, Repository};
use crate::error::ApiResult;
use crate::filter::{Predicate, Scalar, SortDirection};
use crate::handlers::{ensure_exists, paginate};
use crate::middleware::{message, Message};
use crate::policy::{announcement_scope, Principal, Visibility};

const LIST: ListSpec = ListSpec {
    table: "announcements",
    sortable: &["id", "title", "priority", "expires_at", "created_at"],
    searchable: &["title", "message"],
    default_sort: "created_at",
    default_order: SortDirection::Desc,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/stats", get(list_stats))
        .route("/unread/me", get(unread))
        .route("/:id", get(show).put(update).delete(destroy))
        .route("/:id/read", post(mark_read))
        .route("/:id/stats", get(stats))
}

#[derive(Debug, Default, Deserialize)]
pub struct AnnouncementFilters {
    pub priority: Option<Priority>,
    pub is_active: Option<bool>,
    pub target_department: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementCreate {
    pub title: String,
    pub message: String,
    pub announcement_type: Option<String>,
    pub target_department: Option<i64>,
    pub created_by: Option<i64>,
    pub priority: Option<Priority>,
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
    pub target_roles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementUpdate {
    pub title: Option<String>,
    pub message: Option<String>,
    pub announcement_type: Option<String>,
    pub target_department: Option<i64>,
    pub priority: Option<Priority>,
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
    pub target_roles: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct AnnouncementStats {
    pub announcement_id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub total_reads: i64,
    pub total_employees: i64,
    pub read_percentage: f64,
    pub creator_name: Option<String>,
}

fn priority_rank(priority: Priority) -> u8 {
    match priority {
        Priority::High => 0,
        Priority::Normal => 1,
        Priority::Low => 2,
    }
}

/// High before normal before low, newest first within a priority.
fn sort_for_feed(items: &mut [Announcement]) {
    items.sort_by(|a, b| {
        priority_rank(a.priority)
            .cmp(&priority_rank(b.priority))
            .then(b.created_at.cmp(&a.created_at))
    });
}

fn read_percentage(reads: i64, employees: i64) -> f64 {
    if employees == 0 {
        return 0.0;
    }
    (reads as f64 / employees as f64 * 10000.0).round() / 100.0
}

/// Active employees an announcement is aimed at: its department, if any,
/// narrowed to the employees whose login carries one of the target roles.
fn audience_of(target_department: Option<i64>, role_holders: Option<Vec<i64>>) -> Predicate {
    Predicate::all([
        Predicate::eq("status", EmployeeStatus::Active),
        Predicate::eq_if("department_id", target_department),
        role_holders.map_or(Predicate::Always, |ids| {
            Predicate::one_of("id", ids.into_iter().map(Scalar::from).collect())
        }),
    ])
}

async fn audience(pool: &PgPool, announcement: &Announcement) -> Result<Predicate, DatabaseError> {
    let role_holders = match &announcement.target_roles {
        None => None,
        Some(roles) => {
            let holders = Repository::<User>::select_where(
                pool,
                Predicate::one_of("role", roles.iter().map(|r| Scalar::from(r.as_str())).collect()),
            )
            .await?;
            Some(holders.into_iter().filter_map(|u| u.employee_id).collect())
        }
    };
    Ok(audience_of(announcement.target_department, role_holders))
}

async fn stats_for(pool: &PgPool, announcement: Announcement) -> Result<AnnouncementStats, DatabaseError> {
    let total_reads =
        Repository::<AnnouncementRead>::count_where(pool, Predicate::eq("announcement_id", announcement.id)).await?;
    let total_employees = Repository::<Employee>::count_where(pool, audience(pool, &announcement).await?).await?;
    let creator_name = match announcement.created_by {
        Some(employee_id) => Repository::<Employee>::find(pool, employee_id).await?.map(|e| e.full_name()),
        None => None,
    };
    Ok(AnnouncementStats {
        announcement_id: announcement.id,
        title: announcement.title,
        created_at: announcement.created_at,
        created_by: announcement.created_by,
        expires_at: announcement.expires_at,
        total_reads,
        total_employees,
        read_percentage: read_percentage(total_reads, total_employees),
        creator_name,
    })
}

/// GET /announcements
pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
    Query(filters): Query<AnnouncementFilters>,
) -> ApiResult<Json<Page<Announcement>>> {
    let predicate = Predicate::all([
        announcement_scope(&principal, Utc::now()),
        Predicate::eq_if("priority", filters.priority),
        Predicate::eq_if("is_active", filters.is_active),
        Predicate::eq_if("target_department", filters.target_department),
    ]);
    paginate(&state.pool, &LIST, &params, predicate).await
}

/// GET /announcements/:id
pub async fn show(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Announcement>> {
    let announcement = Repository::<Announcement>::find_404(&state.pool, id).await?;
    announcement.ensure_visible(&principal)?;
    Ok(Json(announcement))
}

/// POST /announcements
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<AnnouncementCreate>,
) -> ApiResult<Json<Announcement>> {
    principal.require_admin_or_manager()?;

    let mut tx = state.pool.begin().await?;
    if let Some(department_id) = input.target_department {
        ensure_exists::<Department>(&mut tx, department_id).await?;
    }
    let changes = Changeset::new()
        .set("title", input.title)
        .set("message", input.message)
        .set_opt("announcement_type", input.announcement_type)
        .set_opt("target_department", input.target_department)
        .set("created_by", input.created_by.or(principal.employee_id))
        .set_opt("priority", input.priority)
        .set_opt("is_active", input.is_active)
        .set_opt("expires_at", input.expires_at)
        .set_opt("target_roles", input.target_roles);
    let announcement = Repository::<Announcement>::insert(&mut *tx, changes).await?;
    tx.commit().await?;

    tracing::info!("Announcement {} '{}' posted by '{}'", announcement.id, announcement.title, principal.username);
    Ok(Json(announcement))
}

/// PUT /announcements/:id
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(input): Json<AnnouncementUpdate>,
) -> ApiResult<Json<Announcement>> {
    principal.require_admin_or_manager()?;

    let mut tx = state.pool.begin().await?;
    Repository::<Announcement>::find_404(&mut *tx, id).await?.ensure_visible(&principal)?;
    if let Some(department_id) = input.target_department {
        ensure_exists::<Department>(&mut tx, department_id).await?;
    }
    let changes = Changeset::new()
        .set_opt("title", input.title)
        .set_opt("message", input.message)
        .set_opt("announcement_type", input.announcement_type)
        .set_opt("target_department", input.target_department)
        .set_opt("priority", input.priority)
        .set_opt("is_active", input.is_active)
        .set_opt("expires_at", input.expires_at)
        .set_opt("target_roles", input.target_roles);
    let announcement = Repository::<Announcement>::update(&mut *tx, id, changes).await?;
    tx.commit().await?;
    Ok(Json(announcement))
}

/// DELETE /announcements/:id
pub async fn destroy(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    principal.require_admin()?;

    let mut tx = state.pool.begin().await?;
    Repository::<Announcement>::find_404(&mut *tx, id).await?.ensure_visible(&principal)?;
    let reads = Repository::<AnnouncementRead>::delete_where(&mut *tx, Predicate::eq("announcement_id", id)).await?;
    Repository::<Announcement>::delete(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::debug!("Announcement {} deleted with {} read receipts", id, reads);
    Ok(message("Announcement deleted successfully"))
}

/// POST /announcements/:id/read. Marking twice is a no-op.
pub async fn mark_read(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    let employee_id = principal.require_employee()?;

    let mut tx = state.pool.begin().await?;
    let announcement = Repository::<Announcement>::find_404(&mut *tx, id).await?;
    announcement.ensure_visible(&principal)?;
    sqlx::query(
        "INSERT INTO announcement_reads (announcement_id, employee_id, department_id) \
         VALUES ($1, $2, $3) \
         ON CONFLICT ON CONSTRAINT announcement_reads_once DO NOTHING",
    )
    .bind(id)
    .bind(employee_id)
    .bind(principal.department_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(message("Announcement marked as read"))
}

/// GET /announcements/unread/me
pub async fn unread(State(state): State<AppState>, principal: Principal) -> ApiResult<Json<Vec<Announcement>>> {
    let employee_id = principal.require_employee()?;

    let read_ids: Vec<Scalar> = Repository::<AnnouncementRead>::select_where(
        &state.pool,
        Predicate::eq("employee_id", employee_id),
    )
    .await?
    .into_iter()
    .map(|read| Scalar::from(read.announcement_id))
    .collect();

    let predicate = Predicate::all([
        announcement_scope(&principal, Utc::now()),
        Predicate::eq("is_active", true),
        Predicate::not(Predicate::one_of("id", read_ids)),
    ]);
    let mut items = Repository::<Announcement>::select_where(&state.pool, predicate).await?;
    sort_for_feed(&mut items);
    Ok(Json(items))
}

/// GET /announcements/stats: read statistics for every visible active announcement
pub async fn list_stats(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<AnnouncementStats>>> {
    principal.require_admin_or_manager()?;

    let predicate = Predicate::all([announcement_scope(&principal, Utc::now()), Predicate::eq("is_active", true)]);
    let Json(page) = paginate::<Announcement>(&state.pool, &LIST, &params, predicate).await?;
    let mut items = Vec::with_capacity(page.items.len());
    for announcement in page.items.iter().cloned() {
        items.push(stats_for(&state.pool, announcement).await?);
    }
    Ok(Json(page.with_items(items)))
}

/// GET /announcements/:id/stats
pub async fn stats(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> ApiResult<Json<AnnouncementStats>> {
    principal.require_admin_or_manager()?;

    let announcement = Repository::<Announcement>::find_404(&state.pool, id).await?;
    announcement.ensure_visible(&principal)?;
    Ok(Json(stats_for(&state.pool, announcement).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn announcement(id: i64, priority: Priority, age_hours: i64) -> Announcement {
        let created = Utc::now() - Duration::hours(age_hours);
        Announcement {
            id,
            title: format!("notice {}", id),
            message: "body".to_string(),
            announcement_type: None,
            target_department: None,
            created_by: None,
            priority,
            is_active: true,
            expires_at: None,
            target_roles: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn feed_orders_by_priority_then_newest() {
        let mut items = vec![
            announcement(1, Priority::Low, 1),
            announcement(2, Priority::High, 5),
            announcement(3, Priority::Normal, 2),
            announcement(4, Priority::High, 1),
        ];
        sort_for_feed(&mut items);
        let ids: Vec<i64> = items.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);
    }

    #[test]
    fn audience_narrows_by_department_and_role_holders() {
        let mut filter = crate::filter::Filter::new("employees");
        filter.where_clause(audience_of(Some(3), Some(vec![7, 9])));
        let sql = filter.to_sql();
        assert!(sql.query.contains("\"department_id\" = $2"));
        assert!(sql.query.contains("\"id\" IN ($3, $4)"));

        let mut everyone = crate::filter::Filter::new("employees");
        everyone.where_clause(audience_of(None, None));
        let sql = everyone.to_sql();
        assert!(!sql.query.contains("department_id"));
        assert_eq!(sql.params.len(), 1);
    }

    #[test]
    fn role_targeting_nobody_matches_nobody() {
        let mut filter = crate::filter::Filter::new("employees");
        filter.where_clause(audience_of(None, Some(vec![])));
        assert!(filter.to_sql().query.contains("1=0"));
    }

    #[test]
    fn read_percentage_rounds_to_two_places() {
        assert_eq!(read_percentage(1, 3), 33.33);
        assert_eq!(read_percentage(2, 2), 100.0);
        assert_eq!(read_percentage(5, 0), 0.0);
    }
}
