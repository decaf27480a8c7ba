//! DB Adapter Facade: one uniform create/read/update/delete/
//! query/createTable surface over whichever backend a descriptor's
//! `dbConnection` URL points at. Built on `sqlx::any` rather than the
//! compile-time-typed `SqlxRepository<T, DB>` from `conduit-data-sqlx`,
//! since descriptors select their backend at runtime from JSON, not from a
//! Rust type parameter.

use std::collections::HashMap;
use std::sync::Arc;

use conduit_data::query::{Dialect, IdentifierPolicy, QueryBuilder};
use dashmap::DashMap;
use serde_json::{Map, Value};
use sqlx::any::{AnyPool, AnyPoolOptions, AnyRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::descriptor::{EndpointDescriptor, Relationship};

#[derive(Debug, Clone)]
pub enum DbError {
    /// Connection could not be established or the pool is draining — the
    /// caller should surface this as a retryable `AppError::Db`.
    Unavailable(String),
    InvalidIdentifier(String),
    Query(String),
    NotFound,
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::Unavailable(msg) => write!(f, "database unavailable: {msg}"),
            DbError::InvalidIdentifier(msg) => write!(f, "invalid identifier: {msg}"),
            DbError::Query(msg) => write!(f, "query failed: {msg}"),
            DbError::NotFound => write!(f, "row not found"),
        }
    }
}

impl std::error::Error for DbError {}

fn dialect_for(db_type: Option<&str>) -> Dialect {
    match db_type.unwrap_or("generic") {
        "postgres" | "postgresql" => Dialect::Postgres,
        "mysql" => Dialect::MySql,
        "sqlite" => Dialect::Sqlite,
        _ => Dialect::Generic,
    }
}

/// A page of rows plus the total row count matching the filter (ignoring
/// limit/offset), for `_page`/`_limit` pagination metadata.
pub struct QueryPage {
    pub rows: Vec<Value>,
    pub total: i64,
}

/// Lazily connects and caches one `AnyPool` per normalized `dbConnection`
/// string, closed when the facade (and thus the process) shuts down.
pub struct DbFacade {
    pools: DashMap<String, AnyPool>,
}

impl DbFacade {
    pub fn new() -> Arc<Self> {
        sqlx::any::install_default_drivers();
        Arc::new(Self { pools: DashMap::new() })
    }

    async fn pool_for(&self, descriptor: &EndpointDescriptor) -> Result<AnyPool, DbError> {
        let key = descriptor
            .normalized_connection()
            .ok_or_else(|| DbError::Unavailable("descriptor has no dbConnection".to_string()))?;
        let url = descriptor.db_connection.as_deref().unwrap();
        self.pool_for_connection(&key, url).await
    }

    async fn pool_for_connection(&self, key: &str, url: &str) -> Result<AnyPool, DbError> {
        if let Some(pool) = self.pools.get(key) {
            return Ok(pool.clone());
        }

        let pool = AnyPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| DbError::Unavailable(e.to_string()))?;

        self.pools.insert(key.to_string(), pool.clone());
        Ok(pool)
    }

    /// Insert a positional-value row (`INSERT INTO table VALUES (...)`)
    /// against an arbitrary connection/table pair, used by the
    /// rule engine's `ActionSink` where there is no full
    /// [`EndpointDescriptor`] in scope — only whatever the matching
    /// `database` descriptor's `allowWrite` order contributed as `columns`.
    pub async fn insert_values(
        &self,
        connection: &str,
        db_type: Option<&str>,
        table: &str,
        columns: &[String],
        values: &[Value],
    ) -> Result<(), DbError> {
        validate_identifier(table)?;
        let dialect = dialect_for(db_type);
        let pool = self.pool_for_connection(connection, connection).await?;

        if columns.is_empty() || columns.len() != values.len() {
            let placeholders: Vec<String> = (1..=values.len()).map(|i| dialect_placeholder(dialect, i)).collect();
            let sql = format!("INSERT INTO {} VALUES ({})", quote_ident(table, dialect), placeholders.join(", "));
            let mut query = sqlx::query(&sql);
            for value in values {
                query = query.bind(value_to_bind_string(value).unwrap_or_default());
            }
            query.execute(&pool).await.map_err(|e| DbError::Query(e.to_string()))?;
            return Ok(());
        }

        for column in columns {
            validate_identifier(column)?;
        }
        let quoted_columns: Vec<String> = columns.iter().map(|c| quote_ident(c, dialect)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| dialect_placeholder(dialect, i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table, dialect),
            quoted_columns.join(", "),
            placeholders.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for value in values {
            query = query.bind(value_to_bind_string(value).unwrap_or_default());
        }
        query.execute(&pool).await.map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }

    /// `UPDATE table SET ... WHERE ...` from the rule engine's extracted
    /// assignment/filter pairs, against an arbitrary connection/table pair.
    pub async fn update_values(
        &self,
        connection: &str,
        db_type: Option<&str>,
        table: &str,
        assignments: &[(String, Value)],
        filters: &[(String, Value)],
    ) -> Result<(), DbError> {
        validate_identifier(table)?;
        let dialect = dialect_for(db_type);
        let pool = self.pool_for_connection(connection, connection).await?;

        let mut set_clauses = Vec::new();
        let mut binds = Vec::new();
        let mut idx = 1usize;
        for (column, value) in assignments {
            validate_identifier(column)?;
            set_clauses.push(format!("{} = {}", quote_ident(column, dialect), dialect_placeholder(dialect, idx)));
            binds.push(value_to_bind_string(value).unwrap_or_default());
            idx += 1;
        }
        if set_clauses.is_empty() {
            return Err(DbError::Query("UPDATE with no assignments".to_string()));
        }

        let mut where_clauses = Vec::new();
        for (column, value) in filters {
            validate_identifier(column)?;
            where_clauses.push(format!("{} = {}", quote_ident(column, dialect), dialect_placeholder(dialect, idx)));
            binds.push(value_to_bind_string(value).unwrap_or_default());
            idx += 1;
        }
        if where_clauses.is_empty() {
            return Err(DbError::Query("UPDATE with no WHERE filters".to_string()));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(table, dialect),
            set_clauses.join(", "),
            where_clauses.join(" AND ")
        );
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind.clone());
        }
        query.execute(&pool).await.map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }

    /// `CREATE TABLE IF NOT EXISTS` from `columnDefinitions` + `keys`
    /// ("build from database" is the inverse of this — introspect instead
    /// of declare; this path covers declaring a fresh table).
    pub async fn create_table(&self, descriptor: &EndpointDescriptor) -> Result<(), DbError> {
        let table = descriptor.db_table.as_deref().ok_or_else(|| DbError::InvalidIdentifier("dbTable".into()))?;
        validate_identifier(table)?;
        if descriptor.column_definitions.is_empty() {
            return Ok(());
        }

        let mut columns = Vec::with_capacity(descriptor.column_definitions.len());
        for (name, sql_type) in &descriptor.column_definitions {
            validate_identifier(name)?;
            let pk = descriptor.keys.len() == 1 && descriptor.keys[0] == *name;
            if pk {
                columns.push(format!("{name} {sql_type} PRIMARY KEY"));
            } else {
                columns.push(format!("{name} {sql_type}"));
            }
        }
        let sql = format!("CREATE TABLE IF NOT EXISTS {table} ({})", columns.join(", "));

        let pool = self.pool_for(descriptor).await?;
        sqlx::query(&sql).execute(&pool).await.map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }

    /// List query honoring `allowRead` projection, equality filters, sort,
    /// and pagination — the backbone of the synthesized CRUD `GET` route.
    pub async fn query(
        &self,
        descriptor: &EndpointDescriptor,
        filters: &HashMap<String, String>,
        sort: Option<(&str, bool)>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<QueryPage, DbError> {
        let table = descriptor.db_table.as_deref().ok_or_else(|| DbError::InvalidIdentifier("dbTable".into()))?;
        let dialect = dialect_for(descriptor.db_type.as_deref());

        let mut builder = QueryBuilder::new_with_dialect(table, dialect).identifier_policy(IdentifierPolicy::Quote);
        for (column, value) in filters {
            if !descriptor.allow_read.iter().any(|c| c == column) {
                continue;
            }
            builder = builder.where_eq(column, value);
        }
        if let Some((column, asc)) = sort {
            if descriptor.allow_read.iter().any(|c| c == column) {
                builder = builder.order_by(column, asc);
            }
        }
        if let Some(limit) = limit {
            builder = builder.limit(limit);
        }
        if let Some(offset) = offset {
            builder = builder.offset(offset);
        }

        let columns: Vec<&str> = descriptor.allow_read.iter().map(String::as_str).collect();
        let (sql, params) = builder
            .build_select_checked(if columns.is_empty() { &["*"] } else { &columns })
            .map_err(|e| DbError::InvalidIdentifier(e.to_string()))?;
        let (count_sql, count_params) =
            builder.build_count_checked().map_err(|e| DbError::InvalidIdentifier(e.to_string()))?;

        let pool = self.pool_for(descriptor).await?;

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param.clone());
        }
        let rows = query.fetch_all(&pool).await.map_err(|e| DbError::Query(e.to_string()))?;

        let mut count_query = sqlx::query(&count_sql);
        for param in &count_params {
            count_query = count_query.bind(param.clone());
        }
        let total: i64 = count_query
            .fetch_one(&pool)
            .await
            .map_err(|e| DbError::Query(e.to_string()))?
            .try_get(0)
            .unwrap_or(0);

        Ok(QueryPage { rows: rows.iter().map(row_to_json).collect(), total })
    }

    /// Fetch by primary key(s), joining declared `relationships` in, used
    /// both by the single-record `GET` route and to rehydrate after a
    /// mutation.
    pub async fn read_by_key(
        &self,
        descriptor: &EndpointDescriptor,
        key_values: &HashMap<String, String>,
    ) -> Result<Value, DbError> {
        let table = descriptor.db_table.as_deref().ok_or_else(|| DbError::InvalidIdentifier("dbTable".into()))?;
        let dialect = dialect_for(descriptor.db_type.as_deref());

        let mut builder = QueryBuilder::new_with_dialect(table, dialect).identifier_policy(IdentifierPolicy::Quote);
        for key in &descriptor.keys {
            let value = key_values.get(key).ok_or_else(|| DbError::InvalidIdentifier(key.clone()))?;
            builder = builder.where_eq(key, value);
        }

        let columns: Vec<&str> = descriptor.allow_read.iter().map(String::as_str).collect();
        let (sql, params) = builder
            .build_select_checked(if columns.is_empty() { &["*"] } else { &columns })
            .map_err(|e| DbError::InvalidIdentifier(e.to_string()))?;

        let pool = self.pool_for(descriptor).await?;
        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param.clone());
        }
        let row = query.fetch_optional(&pool).await.map_err(|e| DbError::Query(e.to_string()))?;
        let mut record = row.as_ref().map(row_to_json).ok_or(DbError::NotFound)?;

        if !descriptor.relationships.is_empty() {
            self.attach_relationships(&pool, descriptor, &mut record).await?;
        }

        Ok(record)
    }

    async fn attach_relationships(
        &self,
        pool: &AnyPool,
        descriptor: &EndpointDescriptor,
        record: &mut Value,
    ) -> Result<(), DbError> {
        let Some(obj) = record.as_object_mut() else { return Ok(()) };
        for rel in &descriptor.relationships {
            let Relationship { related_table, foreign_key, related_key, fields, .. } = rel;
            validate_identifier(related_table)?;
            validate_identifier(foreign_key)?;
            validate_identifier(related_key)?;

            let Some(local_value) = obj.get(foreign_key).and_then(value_to_bind_string) else { continue };

            let columns: Vec<&str> = if fields.is_empty() { vec!["*"] } else { fields.iter().map(String::as_str).collect() };
            let builder = QueryBuilder::new(related_table)
                .identifier_policy(IdentifierPolicy::Quote)
                .where_eq(related_key, &local_value);
            let (sql, params) =
                builder.build_select_checked(&columns).map_err(|e| DbError::InvalidIdentifier(e.to_string()))?;

            let mut query = sqlx::query(&sql);
            for param in &params {
                query = query.bind(param.clone());
            }
            let rows = query.fetch_all(pool).await.map_err(|e| DbError::Query(e.to_string()))?;
            let related: Vec<Value> = rows.iter().map(row_to_json).collect();
            obj.insert(related_table.clone(), Value::Array(related));
        }
        Ok(())
    }

    /// Insert a new row restricted to `allowWrite` columns, returning the
    /// freshly read-back record.
    pub async fn create(&self, descriptor: &EndpointDescriptor, body: &Map<String, Value>) -> Result<Value, DbError> {
        let table = descriptor.db_table.as_deref().ok_or_else(|| DbError::InvalidIdentifier("dbTable".into()))?;
        validate_identifier(table)?;
        let dialect = dialect_for(descriptor.db_type.as_deref());

        let mut columns = Vec::new();
        let mut binds = Vec::new();
        for column in &descriptor.allow_write {
            if let Some(value) = body.get(column) {
                validate_identifier(column)?;
                columns.push(column.as_str());
                binds.push(value_to_bind_string(value).unwrap_or_default());
            }
        }
        if columns.is_empty() {
            return Err(DbError::Query("no writable columns present in request body".to_string()));
        }

        let quoted_table = quote_ident(table, dialect);
        let quoted_columns: Vec<String> = columns.iter().map(|c| quote_ident(c, dialect)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| dialect_placeholder(dialect, i)).collect();
        let sql = format!(
            "INSERT INTO {quoted_table} ({}) VALUES ({})",
            quoted_columns.join(", "),
            placeholders.join(", ")
        );

        let pool = self.pool_for(descriptor).await?;
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind.clone());
        }
        query.execute(&pool).await.map_err(|e| DbError::Query(e.to_string()))?;

        let mut key_values = HashMap::new();
        for key in &descriptor.keys {
            if let Some(value) = body.get(key).and_then(value_to_bind_string) {
                key_values.insert(key.clone(), value);
            }
        }
        if key_values.len() == descriptor.keys.len() && !descriptor.keys.is_empty() {
            self.read_by_key(descriptor, &key_values).await
        } else {
            Ok(Value::Object(body.clone()))
        }
    }

    /// Update by primary key(s), restricted to `allowWrite` columns.
    pub async fn update(
        &self,
        descriptor: &EndpointDescriptor,
        key_values: &HashMap<String, String>,
        body: &Map<String, Value>,
    ) -> Result<Value, DbError> {
        let table = descriptor.db_table.as_deref().ok_or_else(|| DbError::InvalidIdentifier("dbTable".into()))?;
        validate_identifier(table)?;
        let dialect = dialect_for(descriptor.db_type.as_deref());

        let mut set_clauses = Vec::new();
        let mut binds = Vec::new();
        let mut idx = 1usize;
        for column in &descriptor.allow_write {
            if let Some(value) = body.get(column) {
                validate_identifier(column)?;
                set_clauses.push(format!("{} = {}", quote_ident(column, dialect), dialect_placeholder(dialect, idx)));
                binds.push(value_to_bind_string(value).unwrap_or_default());
                idx += 1;
            }
        }
        if set_clauses.is_empty() {
            return Err(DbError::Query("no writable columns present in request body".to_string()));
        }

        let mut where_clauses = Vec::new();
        for key in &descriptor.keys {
            validate_identifier(key)?;
            let value = key_values.get(key).ok_or_else(|| DbError::InvalidIdentifier(key.clone()))?;
            where_clauses.push(format!("{} = {}", quote_ident(key, dialect), dialect_placeholder(dialect, idx)));
            binds.push(value.clone());
            idx += 1;
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(table, dialect),
            set_clauses.join(", "),
            where_clauses.join(" AND ")
        );

        let pool = self.pool_for(descriptor).await?;
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind.clone());
        }
        let result = query.execute(&pool).await.map_err(|e| DbError::Query(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.read_by_key(descriptor, key_values).await
    }

    /// Delete by primary key(s).
    pub async fn delete(&self, descriptor: &EndpointDescriptor, key_values: &HashMap<String, String>) -> Result<(), DbError> {
        let table = descriptor.db_table.as_deref().ok_or_else(|| DbError::InvalidIdentifier("dbTable".into()))?;
        validate_identifier(table)?;
        let dialect = dialect_for(descriptor.db_type.as_deref());

        let mut where_clauses = Vec::new();
        let mut binds = Vec::new();
        for (idx, key) in descriptor.keys.iter().enumerate() {
            validate_identifier(key)?;
            let value = key_values.get(key).ok_or_else(|| DbError::InvalidIdentifier(key.clone()))?;
            where_clauses.push(format!("{} = {}", quote_ident(key, dialect), dialect_placeholder(dialect, idx + 1)));
            binds.push(value.clone());
        }
        if where_clauses.is_empty() {
            return Err(DbError::Query("delete requires at least one key column".to_string()));
        }

        let sql = format!("DELETE FROM {} WHERE {}", quote_ident(table, dialect), where_clauses.join(" AND "));

        let pool = self.pool_for(descriptor).await?;
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind.clone());
        }
        let result = query.execute(&pool).await.map_err(|e| DbError::Query(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

fn validate_identifier(ident: &str) -> Result<(), DbError> {
    if crate::descriptor::is_valid_identifier(ident) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(ident.to_string()))
    }
}

fn quote_ident(ident: &str, dialect: Dialect) -> String {
    let quote = match dialect {
        Dialect::MySql => '`',
        _ => '"',
    };
    format!("{quote}{ident}{quote}")
}

fn dialect_placeholder(dialect: Dialect, index: usize) -> String {
    match dialect {
        Dialect::Postgres => format!("${index}"),
        _ => "?".to_string(),
    }
}

fn value_to_bind_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// `AnyRow` exposes column type names but not a generic decode; probe the
/// declared SQL type name and fall back to text for anything unrecognized.
fn row_to_json(row: &AnyRow) -> Value {
    let mut obj = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let value = decode_column(row, idx);
        obj.insert(name, value);
    }
    Value::Object(obj)
}

fn decode_column(row: &AnyRow, idx: usize) -> Value {
    let raw = match row.try_get_raw(idx) {
        Ok(raw) => raw,
        Err(_) => return Value::Null,
    };
    if raw.is_null() {
        return Value::Null;
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();

    if type_name.contains("BOOL") {
        if let Ok(v) = row.try_get::<bool, _>(idx) {
            return Value::Bool(v);
        }
    }
    if type_name.contains("INT") {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Value::Number(v.into());
        }
    }
    if type_name.contains("FLOAT") || type_name.contains("DOUBLE") || type_name.contains("REAL") || type_name.contains("NUMERIC") {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            if let Some(n) = serde_json::Number::from_f64(v) {
                return Value::Number(n);
            }
        }
    }
    row.try_get::<String, _>(idx).map(Value::String).unwrap_or(Value::Null)
}
