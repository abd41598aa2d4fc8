use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// What the employee guard needs to know on every request.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EmployeeGate {
    pub admin_id: u64,
    pub is_active: bool,
    pub device_id: Option<String>,
    pub device_lock_enabled: bool,
}

/// employee_id => gate record. Short TTL so admin-side changes show up quickly
/// even on other instances; local writes call [`invalidate`].
static GATE_CACHE: Lazy<Cache<u64, EmployeeGate>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(300))
        .support_invalidation_closures()
        .build()
});

async fn fetch(pool: &MySqlPool, employee_id: u64) -> Result<Option<EmployeeGate>, sqlx::Error> {
    sqlx::query_as::<_, EmployeeGate>(
        r#"
        SELECT e.admin_id, e.is_active, e.device_id, a.device_lock_enabled
        FROM employees e
        JOIN admins a ON a.id = e.admin_id
        WHERE e.id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await
}

/// Cached lookup, falling back to the database.
pub async fn get(pool: &MySqlPool, employee_id: u64) -> Result<Option<EmployeeGate>, sqlx::Error> {
    if let Some(gate) = GATE_CACHE.get(&employee_id).await {
        return Ok(Some(gate));
    }

    let gate = fetch(pool, employee_id).await?;
    if let Some(g) = &gate {
        GATE_CACHE.insert(employee_id, g.clone()).await;
    }
    Ok(gate)
}

pub async fn invalidate(employee_id: u64) {
    GATE_CACHE.invalidate(&employee_id).await;
}

/// Drop every cached employee of a tenant (after tenant settings change).
pub fn invalidate_tenant(admin_id: u64) {
    if let Err(e) = GATE_CACHE.invalidate_entries_if(move |_, gate| gate.admin_id == admin_id) {
        log::warn!("Gate cache tenant invalidation unavailable: {}", e);
        GATE_CACHE.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(admin_id: u64) -> EmployeeGate {
        EmployeeGate {
            admin_id,
            is_active: true,
            device_id: Some("phone-1".into()),
            device_lock_enabled: true,
        }
    }

    #[actix_web::test]
    async fn invalidate_removes_entry() {
        GATE_CACHE.insert(9_001, gate(1)).await;
        assert!(GATE_CACHE.get(&9_001).await.is_some());

        invalidate(9_001).await;
        assert!(GATE_CACHE.get(&9_001).await.is_none());
    }
}
