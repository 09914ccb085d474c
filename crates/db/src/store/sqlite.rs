use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{
    FromRow, QueryBuilder, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{DocumentStore, StoreError};
use crate::models::{
    document::Document,
    query::{Condition, Filter, StoreQuery},
};

/// Documents kept as JSON bodies in a single SQLite table, one logical
/// collection per resource.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pub pool: SqlitePool,
}

#[derive(FromRow)]
struct DocumentRow {
    id: Uuid,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let fields: Map<String, Value> =
            serde_json::from_str(&row.body).map_err(|e| StoreError::Corrupt {
                id: row.id,
                reason: e.to_string(),
            })?;
        Ok(Document {
            id: row.id,
            created: row.created_at,
            updated: row.updated_at,
            fields,
        })
    }
}

impl SqliteDocumentStore {
    /// Opens (creating if needed) the database at `database_url` and applies
    /// pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        info!(database_url, "connected to document store");
        Self::from_pool(pool).await
    }

    /// Private in-memory database. A single connection that is never
    /// recycled keeps the data alive for the lifetime of the pool.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{field}\"")
}

fn push_field(builder: &mut QueryBuilder<'_, Sqlite>, field: &str) {
    builder.push("json_extract(body, ");
    builder.push_bind(json_path(field));
    builder.push(")");
}

fn push_identifier_filter(builder: &mut QueryBuilder<'_, Sqlite>, condition: &Condition) {
    let candidates: &[Value] = match condition {
        Condition::Eq(value) => std::slice::from_ref(value),
        Condition::In(values) => values,
    };
    let ids: Vec<Uuid> = candidates
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|raw| Uuid::parse_str(raw).ok())
        .collect();
    if ids.is_empty() {
        builder.push("0 = 1");
        return;
    }
    builder.push("id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");
}

fn push_json_type(builder: &mut QueryBuilder<'_, Sqlite>, field: &str, types: &str) {
    builder.push("json_type(body, ");
    builder.push_bind(json_path(field));
    builder.push(format!(") IN ({types})"));
}

/// One `field == value` predicate. The stored JSON type is checked as well,
/// so `true` never matches the number `1` and `"1"` never matches `1`.
fn push_value_match(builder: &mut QueryBuilder<'_, Sqlite>, field: &str, value: &Value) {
    match value {
        Value::Null => {
            push_field(builder, field);
            builder.push(" IS NULL");
        }
        Value::Bool(true) => push_json_type(builder, field, "'true'"),
        Value::Bool(false) => push_json_type(builder, field, "'false'"),
        Value::Number(number) => {
            builder.push("(");
            push_json_type(builder, field, "'integer', 'real'");
            builder.push(" AND ");
            push_field(builder, field);
            builder.push(" = ");
            match number.as_i64() {
                Some(int) => builder.push_bind(int),
                None => builder.push_bind(number.as_f64().unwrap_or_default()),
            };
            builder.push(")");
        }
        Value::String(text) => {
            builder.push("(");
            push_json_type(builder, field, "'text'");
            builder.push(" AND ");
            push_field(builder, field);
            builder.push(" = ");
            builder.push_bind(text.clone());
            builder.push(")");
        }
        Value::Array(_) | Value::Object(_) => {
            builder.push("(");
            push_json_type(builder, field, "'array', 'object'");
            builder.push(" AND ");
            push_field(builder, field);
            builder.push(" = json(");
            builder.push_bind(value.to_string());
            builder.push("))");
        }
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) {
    if filter.field == "_id" {
        push_identifier_filter(builder, &filter.condition);
        return;
    }
    match &filter.condition {
        Condition::Eq(value) => push_value_match(builder, &filter.field, value),
        Condition::In(values) if values.is_empty() => {
            builder.push("0 = 1");
        }
        Condition::In(values) => {
            builder.push("(");
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    builder.push(" OR ");
                }
                push_value_match(builder, &filter.field, value);
            }
            builder.push(")");
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find(
        &self,
        collection: &str,
        query: &StoreQuery,
    ) -> Result<Vec<Document>, StoreError> {
        if let Some(field) = query.invalid_field() {
            return Err(StoreError::InvalidField(field.to_string()));
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, body, created_at, updated_at FROM documents WHERE collection = ",
        );
        builder.push_bind(collection.to_string());
        for filter in &query.filters {
            builder.push(" AND ");
            push_filter(&mut builder, filter);
        }
        builder.push(" ORDER BY rowid ASC");
        match (query.limit, query.skip) {
            (Some(limit), skip) => {
                builder.push(" LIMIT ");
                builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
                builder.push(" OFFSET ");
                builder.push_bind(i64::try_from(skip.unwrap_or(0)).unwrap_or(i64::MAX));
            }
            (None, Some(skip)) => {
                builder.push(" LIMIT -1 OFFSET ");
                builder.push_bind(i64::try_from(skip).unwrap_or(i64::MAX));
            }
            (None, None) => {}
        }

        debug!(collection, sql = builder.sql(), "document query");
        let rows = builder
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Document::try_from).collect()
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"SELECT id, body, created_at, updated_at
               FROM documents
               WHERE collection = $1 AND id = $2"#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Document::try_from).transpose()
    }

    async fn create(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        let document = Document::new(Uuid::new_v4(), fields, Utc::now());
        let body = Value::Object(document.fields.clone()).to_string();
        sqlx::query(
            r#"INSERT INTO documents (id, collection, body, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(document.id)
        .bind(collection)
        .bind(body)
        .bind(document.created)
        .bind(document.updated)
        .execute(&self.pool)
        .await?;
        Ok(document)
    }

    async fn save(&self, collection: &str, document: &Document) -> Result<Document, StoreError> {
        let body = Value::Object(document.fields.clone()).to_string();
        let result = sqlx::query(
            r#"UPDATE documents
               SET body = $3, updated_at = $4
               WHERE collection = $1 AND id = $2"#,
        )
        .bind(collection)
        .bind(document.id)
        .bind(body)
        .bind(document.updated)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(document.id));
        }
        Ok(document.clone())
    }

    async fn remove(&self, collection: &str, id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
