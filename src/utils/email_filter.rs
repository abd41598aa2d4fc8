use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Login namespaces; the same address may exist once per account kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Account {
    Admin,
    Employee,
}

impl Account {
    fn table(self) -> &'static str {
        match self {
            Account::Admin => "admins",
            Account::Employee => "employees",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Account::Admin => "a:",
            Account::Employee => "e:",
        }
    }
}

static EMAIL_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

fn key(account: Account, email: &str) -> String {
    format!("{}{}", account.prefix(), normalize(email))
}

/// Check if an email might be registered (false positives possible)
pub fn might_exist(account: Account, email: &str) -> bool {
    match EMAIL_FILTER.read() {
        Ok(filter) => filter.contains(&key(account, email)),
        // A poisoned filter can't rule anything out.
        Err(_) => true,
    }
}

pub fn insert(account: Account, email: &str) {
    if let Ok(mut filter) = EMAIL_FILTER.write() {
        filter.add(&key(account, email));
    }
}

/// true => email is free for this account kind
pub async fn is_email_available(
    pool: &MySqlPool,
    account: Account,
    email: &str,
) -> Result<bool, sqlx::Error> {
    // Cuckoo filter: a miss is definitive.
    if !might_exist(account, email) {
        return Ok(true);
    }

    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE email = ? LIMIT 1)",
        account.table()
    );
    let exists = sqlx::query_scalar::<_, i64>(&sql)
        .bind(normalize(email))
        .fetch_one(pool)
        .await?;

    Ok(exists == 0)
}

/// Warm up the filter using streaming + batching
pub async fn warmup_email_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut total = 0usize;

    for account in [Account::Admin, Account::Employee] {
        let sql = format!("SELECT email FROM {}", account.table());
        let mut stream = sqlx::query_as::<_, (String,)>(&sql).fetch(pool);
        let mut batch = Vec::with_capacity(batch_size);

        while let Some(row) = stream.next().await {
            let (email,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

            batch.push(key(account, &email));
            total += 1;

            if batch.len() == batch_size {
                insert_batch(&batch);
                batch.clear();
            }
        }

        if !batch.is_empty() {
            insert_batch(&batch);
        }
    }

    log::info!("Email filter warmup complete: {} accounts", total);
    Ok(())
}

fn insert_batch(keys: &[String]) {
    if let Ok(mut filter) = EMAIL_FILTER.write() {
        for k in keys {
            filter.add(k);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_emails_are_found_case_insensitively() {
        insert(Account::Admin, "Owner@Filter-Test.example");
        assert!(might_exist(Account::Admin, "owner@filter-test.example"));
        assert!(might_exist(Account::Admin, "  OWNER@filter-test.example "));
    }

    #[test]
    fn namespaces_are_separate() {
        insert(Account::Employee, "only-employee@filter-test.example");
        assert!(might_exist(Account::Employee, "only-employee@filter-test.example"));
        assert!(!might_exist(Account::Admin, "only-employee@filter-test.example"));
    }
}
