use anyhow::Result;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use moka::Expiry;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::{Duration, Instant};

/// Keeps each revoked jti exactly until its token would have expired anyway.
struct UntilTokenExpiry;

impl Expiry<String, i64> for UntilTokenExpiry {
    fn expire_after_create(&self, _jti: &String, exp: &i64, _created_at: Instant) -> Option<Duration> {
        let remaining = exp.saturating_sub(Utc::now().timestamp()).max(0);
        Some(Duration::from_secs(remaining as u64))
    }
}

/// jti => token `exp` (unix seconds)
static REVOKED: Lazy<Cache<String, i64>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(1_000_000)
        .expire_after(UntilTokenExpiry)
        .build()
});

pub async fn is_revoked(jti: &str) -> bool {
    REVOKED.get(jti).await.is_some()
}

/// Persist and cache a revocation. Re-revoking the same jti is a no-op.
pub async fn revoke(pool: &MySqlPool, jti: &str, exp: i64) -> Result<(), sqlx::Error> {
    let expires_at = DateTime::<Utc>::from_timestamp(exp, 0).unwrap_or_else(Utc::now);

    sqlx::query(
        r#"
        INSERT INTO revoked_tokens (jti, expires_at)
        VALUES (?, ?)
        ON DUPLICATE KEY UPDATE expires_at = VALUES(expires_at)
        "#,
    )
    .bind(jti)
    .bind(expires_at)
    .execute(pool)
    .await?;

    remember(jti, exp).await;
    Ok(())
}

pub(crate) async fn remember(jti: &str, exp: i64) {
    REVOKED.insert(jti.to_string(), exp).await;
}

/// Load still-relevant revocations into memory and purge expired rows.
pub async fn warmup_revocations(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String, DateTime<Utc>)>(
        "SELECT jti, expires_at FROM revoked_tokens WHERE expires_at > UTC_TIMESTAMP()",
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (jti, expires_at) = row?;
        batch.push((jti, expires_at.timestamp()));
        total += 1;

        if batch.len() >= batch_size {
            remember_batch(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        remember_batch(&batch).await;
    }
    drop(stream);

    let purged = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= UTC_TIMESTAMP()")
        .execute(pool)
        .await?
        .rows_affected();

    log::info!(
        "Revocation cache warmup complete: {} active, {} expired rows purged",
        total,
        purged
    );

    Ok(())
}

async fn remember_batch(entries: &[(String, i64)]) {
    let futures: Vec<_> = entries
        .iter()
        .map(|(jti, exp)| REVOKED.insert(jti.clone(), *exp))
        .collect();

    futures::future::join_all(futures).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn remembered_tokens_are_revoked_until_expiry() {
        let exp = Utc::now().timestamp() + 3600;
        assert!(!is_revoked("jti-test-live").await);

        remember("jti-test-live", exp).await;
        assert!(is_revoked("jti-test-live").await);
    }

    #[actix_web::test]
    async fn loaded_batches_are_revoked_immediately() {
        let exp = Utc::now().timestamp() + 3600;
        let batch = vec![("jti-test-batch-a".to_string(), exp), ("jti-test-batch-b".to_string(), exp)];

        remember_batch(&batch).await;
        assert!(is_revoked("jti-test-batch-a").await);
        assert!(is_revoked("jti-test-batch-b").await);
        assert!(!is_revoked("jti-test-batch-c").await);
    }

    #[actix_web::test]
    async fn already_expired_tokens_are_not_kept() {
        let exp = Utc::now().timestamp() - 10;
        remember("jti-test-expired", exp).await;
        REVOKED.run_pending_tasks().await;
        assert!(!is_revoked("jti-test-expired").await);
    }
}
