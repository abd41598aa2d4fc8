use chrono::NaiveDate;
use serde_json::Value;
use sqlx::MySqlPool;

use crate::error::ApiError;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

/// Expected shape of an updatable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    NullableText,
    Number,
    Bool,
    NullableDate,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn convert(column: &str, kind: ColumnKind, value: &Value) -> Result<SqlValue, ApiError> {
    let invalid = || ApiError::bad_request(format!("Invalid value for `{column}`"));

    match (kind, value) {
        (ColumnKind::NullableText | ColumnKind::NullableDate, Value::Null) => Ok(SqlValue::Null),
        (ColumnKind::Text | ColumnKind::NullableText, Value::String(s)) => {
            let s = s.trim();
            if kind == ColumnKind::Text && s.is_empty() {
                return Err(invalid());
            }
            Ok(SqlValue::String(s.to_string()))
        }
        (ColumnKind::Number, Value::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() && f >= 0.0 => Ok(SqlValue::F64(f)),
            _ => Err(invalid()),
        },
        (ColumnKind::Bool, Value::Bool(b)) => Ok(SqlValue::Bool(*b)),
        (ColumnKind::NullableDate, Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(SqlValue::Date)
            .map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// ===============================
/// Build a tenant-scoped dynamic UPDATE
/// ===============================
///
/// Only keys listed in `allowed` are accepted; the statement always ends with
/// `WHERE id = ? AND admin_id = ?`.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[(&str, ColumnKind)],
    id: u64,
    admin_id: u64,
) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    let mut columns = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 2);

    for (key, value) in obj {
        let (column, kind) = allowed
            .iter()
            .find(|(name, _)| *name == key.as_str())
            .ok_or_else(|| ApiError::bad_request(format!("Field `{key}` cannot be updated")))?;

        columns.push(format!("{column} = ?"));
        values.push(convert(column, *kind, value)?);
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE id = ? AND admin_id = ?",
        table,
        columns.join(", ")
    );
    values.push(SqlValue::U64(id));
    values.push(SqlValue::U64(admin_id));

    Ok(SqlUpdate { sql, values })
}

/// Bind a sequence of [`SqlValue`]s onto any sqlx builder
/// (`query`, `query_as` or `query_scalar`).
#[macro_export]
macro_rules! bind_values {
    ($query:expr, $values:expr) => {{
        use $crate::utils::db_utils::SqlValue;
        let mut query = $query;
        for value in $values {
            query = match value {
                SqlValue::String(v) => query.bind(v),
                SqlValue::U64(v) => query.bind(v),
                SqlValue::F64(v) => query.bind(v),
                SqlValue::Bool(v) => query.bind(v),
                SqlValue::Date(v) => query.bind(v),
                SqlValue::Null => query.bind(None::<String>),
            };
        }
        query
    }};
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let query = crate::bind_values!(sqlx::query(&update.sql), update.values);
    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// Escapes `\\`, `%` and `_` so user text matches literally in
/// `LIKE ? ESCAPE '\\'`.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// ===============================
/// WHERE clause builder for list endpoints
/// ===============================
#[derive(Debug, Default)]
pub struct Filters {
    conditions: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition; `values` must match its `?` placeholders in order.
    pub fn push(&mut self, condition: &str, values: impl IntoIterator<Item = SqlValue>) {
        self.conditions.push(condition.to_string());
        self.values.extend(values);
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[(&str, ColumnKind)] = &[
        ("name", ColumnKind::Text),
        ("phone", ColumnKind::NullableText),
        ("basic_salary", ColumnKind::Number),
        ("is_active", ColumnKind::Bool),
        ("joining_date", ColumnKind::NullableDate),
    ];

    #[test]
    fn builds_scoped_statement() {
        let payload = json!({"name": " Jane ", "basic_salary": 42000});
        let update = build_update_sql("employees", &payload, COLUMNS, 5, 1).unwrap();

        assert!(update.sql.starts_with("UPDATE employees SET "));
        assert!(update.sql.ends_with("WHERE id = ? AND admin_id = ?"));
        assert!(update.sql.contains("name = ?"));
        assert!(update.sql.contains("basic_salary = ?"));
        assert_eq!(update.values.len(), 4);
        assert!(update.values.contains(&SqlValue::String("Jane".into())));
        assert!(update.values.contains(&SqlValue::F64(42000.0)));
        assert_eq!(update.values[2..], [SqlValue::U64(5), SqlValue::U64(1)]);
    }

    #[test]
    fn rejects_unknown_and_protected_columns() {
        let err = build_update_sql("employees", &json!({"admin_id": 2}), COLUMNS, 5, 1).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = build_update_sql("employees", &json!({"password": "x"}), COLUMNS, 5, 1).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn validates_value_shapes() {
        assert!(build_update_sql("employees", &json!({"name": ""}), COLUMNS, 1, 1).is_err());
        assert!(build_update_sql("employees", &json!({"name": null}), COLUMNS, 1, 1).is_err());
        assert!(build_update_sql("employees", &json!({"basic_salary": -5}), COLUMNS, 1, 1).is_err());
        assert!(build_update_sql("employees", &json!({"is_active": "yes"}), COLUMNS, 1, 1).is_err());
        assert!(build_update_sql("employees", &json!({"joining_date": "01/02/2026"}), COLUMNS, 1, 1).is_err());

        let ok = build_update_sql(
            "employees",
            &json!({"phone": null, "joining_date": "2026-02-01", "is_active": false}),
            COLUMNS,
            1,
            1,
        )
        .unwrap();
        assert!(ok.values.contains(&SqlValue::Null));
        assert!(ok.values.contains(&SqlValue::Bool(false)));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), r"50\%\_off");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("Jane Doe"), "Jane Doe");
    }

    #[test]
    fn filters_join_conditions_in_order() {
        let mut filters = Filters::new();
        assert_eq!(filters.where_clause(), "");

        filters.push("admin_id = ?", [SqlValue::U64(1)]);
        filters.push(
            "(name LIKE ? OR email LIKE ?)",
            [SqlValue::String("%jo%".into()), SqlValue::String("%jo%".into())],
        );
        assert_eq!(
            filters.where_clause(),
            " WHERE admin_id = ? AND (name LIKE ? OR email LIKE ?)"
        );
        assert_eq!(filters.values.len(), 3);
        assert_eq!(filters.values[0], SqlValue::U64(1));
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("employees", &json!({}), COLUMNS, 1, 1).is_err());
        assert!(build_update_sql("employees", &json!([1, 2]), COLUMNS, 1, 1).is_err());
    }
}
