use sqlx::PgPool;
use uuid::Uuid;

use crate::models::user::{AdminProfileRow, ProfileRow, Role, User};

pub async fn find_user(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<ProfileRow>, sqlx::Error> {
    sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_admin_profile(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<AdminProfileRow>, sqlx::Error> {
    sqlx::query_as::<_, AdminProfileRow>("SELECT * FROM admin_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Staff users, optionally narrowed to one role.
pub async fn list_staff(pool: &PgPool, role: Option<Role>) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users
        WHERE role <> 'candidate' AND ($1::text IS NULL OR role = $1)
        ORDER BY full_name ASC
        "#,
    )
    .bind(role.map(Role::as_str))
    .fetch_all(pool)
    .await
}

/// How many of `ids` are existing staff users.
pub async fn count_staff(pool: &PgPool, ids: &[Uuid]) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE id = ANY($1) AND role <> 'candidate'",
    )
    .bind(ids)
    .fetch_one(pool)
    .await
}
