//! User database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::user::User;

/// Get user by id.
pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, password_hash, name, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Get user by email (for login/register-conflict checks).
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, password_hash, name, created_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Insert a new user. Fails with a unique-violation if the email is taken;
/// the HTTP layer maps that to `CONFLICT`.
pub async fn create_user(pool: &PgPool, email: &str, password_hash: &str, name: &str) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, password_hash, name, created_at)
        VALUES (gen_random_uuid(), $1, $2, $3, now())
        RETURNING id, email, password_hash, name, created_at
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    // Query correctness against a live Postgres instance is exercised in
    // integration tests, not here — these queries have no branching logic
    // to unit test in isolation.
}
