//! Refresh-token store: rotation and revocation.
//!
//! A refresh token is never stored in the clear — callers pass
//! `auth::hash_refresh_token(raw)` in and get hashes back out.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<Uuid>,
}

/// Insert a freshly-issued refresh token.
pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<Uuid> {
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, created_at, expires_at)
        VALUES (gen_random_uuid(), $1, $2, now(), $3)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Look up a token by its hash, regardless of validity — callers decide
/// whether it's usable (not revoked, not expired).
pub async fn find_by_hash(pool: &PgPool, token_hash: &str) -> Result<Option<RefreshTokenRow>> {
    let row = sqlx::query_as::<_, RefreshTokenRow>(
        r#"
        SELECT id, user_id, token_hash, created_at, expires_at, revoked_at, replaced_by
        FROM refresh_tokens
        WHERE token_hash = $1
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Atomically mark `old_id` revoked/replaced and insert the new token —
/// the rotation at the heart of `POST /auth/refresh`.
pub async fn rotate(
    pool: &PgPool,
    old_id: Uuid,
    user_id: Uuid,
    new_token_hash: &str,
    new_expires_at: DateTime<Utc>,
) -> Result<Uuid> {
    let mut tx = pool.begin().await?;

    let new_row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, created_at, expires_at)
        VALUES (gen_random_uuid(), $1, $2, now(), $3)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(new_token_hash)
    .bind(new_expires_at)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked_at = now(), replaced_by = $2
        WHERE id = $1
        "#,
    )
    .bind(old_id)
    .bind(new_row.0)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(new_row.0)
}

/// Revoke a single token (`POST /auth/logout`).
pub async fn revoke(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE refresh_tokens SET revoked_at = now() WHERE id = $1 AND revoked_at IS NULL")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

impl RefreshTokenRow {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn is_valid_rejects_revoked_and_expired() {
        let now = Utc::now();
        let base = RefreshTokenRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "hash".into(),
            created_at: now,
            expires_at: now + Duration::days(7),
            revoked_at: None,
            replaced_by: None,
        };
        assert!(base.is_valid(now));

        let mut revoked = base.clone();
        revoked.revoked_at = Some(now);
        assert!(!revoked.is_valid(now));

        let mut expired = base.clone();
        expired.expires_at = now - Duration::seconds(1);
        assert!(!expired.is_valid(now));
    }
}
