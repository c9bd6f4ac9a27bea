//! Office Records
//!
//! Tenant-scoped access to clients, cases, hearings and tasks. Every
//! statement carries `office_id = ?`, only schema columns reach SQL, and
//! values are always bound parameters.

use chrono::{NaiveDate, NaiveDateTime};
use counsel_tools::{builtin_schemas, EntityKind, EntitySchema, FieldSpec, FieldType};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};

use super::database::{Database, OFFICE_COLUMN};
use crate::utils::error::{AppError, AppResult};

/// Rows returned by a query when no limit is given
pub const DEFAULT_QUERY_LIMIT: usize = 50;
/// Hard cap on rows returned by a query
pub const MAX_QUERY_LIMIT: usize = 200;

/// Tenant-scoped record operations backing the admin catalogue.
pub trait RecordStore: Send + Sync {
    /// Rows of `entity` in `office` matching `filters`, ordered by id.
    fn query(
        &self,
        office: &str,
        entity: EntityKind,
        filters: &Map<String, Value>,
        limit: Option<usize>,
    ) -> AppResult<Vec<Value>>;

    /// Insert a row and return it as stored.
    fn insert(&self, office: &str, entity: EntityKind, values: &Map<String, Value>)
        -> AppResult<Value>;

    /// Change the given fields of row `id` and return the updated row.
    fn update(
        &self,
        office: &str,
        entity: EntityKind,
        id: i64,
        changes: &Map<String, Value>,
    ) -> AppResult<Value>;

    /// Delete row `id` and return the row as it was.
    fn delete(&self, office: &str, entity: EntityKind, id: i64) -> AppResult<Value>;
}

/// `RecordStore` over the SQLite tables created by [`Database`].
pub struct SqliteRecordStore {
    db: Database,
    schemas: Vec<EntitySchema>,
}

impl SqliteRecordStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            schemas: builtin_schemas(),
        }
    }

    fn schema(&self, entity: EntityKind) -> AppResult<&EntitySchema> {
        self.schemas
            .iter()
            .find(|s| s.entity == entity)
            .ok_or_else(|| AppError::internal(format!("no schema for {}", entity)))
    }

    fn select_columns(schema: &EntitySchema) -> String {
        let mut columns = vec!["id".to_string()];
        columns.extend(schema.field_names().map(str::to_string));
        columns.push("created_at".to_string());
        columns.push("updated_at".to_string());
        columns.join(", ")
    }

    fn fetch_one(
        conn: &Connection,
        schema: &EntitySchema,
        office: &str,
        id: i64,
    ) -> AppResult<Option<Value>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1 AND {} = ?2",
            Self::select_columns(schema),
            schema.entity.table(),
            OFFICE_COLUMN
        );
        let row = conn
            .query_row(&sql, rusqlite::params![id, office], |row| {
                row_to_json(row, schema)
            })
            .optional()?;
        Ok(row)
    }

    /// Referenced ids must exist in the same office.
    fn check_references(
        conn: &Connection,
        schema: &EntitySchema,
        office: &str,
        values: &[(&FieldSpec, SqlValue)],
    ) -> AppResult<()> {
        for (field, value) in values {
            let (Some(target), SqlValue::Integer(target_id)) = (field.references, value) else {
                continue;
            };
            let exists: Option<i64> = conn
                .query_row(
                    &format!(
                        "SELECT id FROM {} WHERE id = ?1 AND {} = ?2",
                        target.table(),
                        OFFICE_COLUMN
                    ),
                    rusqlite::params![target_id, office],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(AppError::not_found(format!(
                    "{} {} referenced by {}.{} does not exist",
                    target, target_id, schema.entity, field.name
                )));
            }
        }
        Ok(())
    }

    /// Rows in other tables that still point at `entity` `id`.
    fn dependents(&self, conn: &Connection, entity: EntityKind, office: &str, id: i64) -> AppResult<Vec<String>> {
        let mut found = Vec::new();
        for schema in &self.schemas {
            for field in schema.fields.iter().filter(|f| f.references == Some(entity)) {
                let count: i64 = conn.query_row(
                    &format!(
                        "SELECT COUNT(*) FROM {} WHERE {} = ?1 AND {} = ?2",
                        schema.entity.table(),
                        field.name,
                        OFFICE_COLUMN
                    ),
                    rusqlite::params![id, office],
                    |row| row.get(0),
                )?;
                if count > 0 {
                    found.push(format!("{} {}", count, schema.entity));
                }
            }
        }
        Ok(found)
    }
}

impl RecordStore for SqliteRecordStore {
    fn query(
        &self,
        office: &str,
        entity: EntityKind,
        filters: &Map<String, Value>,
        limit: Option<usize>,
    ) -> AppResult<Vec<Value>> {
        let schema = self.schema(entity)?;
        let mut clauses = vec![format!("{} = ?", OFFICE_COLUMN)];
        let mut params: Vec<SqlValue> = vec![SqlValue::Text(office.to_string())];

        for (key, raw) in filters {
            if raw.is_null() {
                continue;
            }
            if key == "id" {
                clauses.push("id = ?".to_string());
                params.push(SqlValue::Integer(as_integer("id", raw)?));
                continue;
            }
            let field = schema.field(key).ok_or_else(|| {
                AppError::validation(format!("{} has no field named {}", entity, key))
            })?;
            match bind_value(field, raw)? {
                SqlValue::Text(text) if field.field_type == FieldType::Text => {
                    clauses.push(format!("{} LIKE ? ESCAPE '\\'", field.name));
                    params.push(SqlValue::Text(format!("%{}%", escape_like(&text))));
                }
                value => {
                    clauses.push(format!("{} = ?", field.name));
                    params.push(value);
                }
            }
        }

        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT).clamp(1, MAX_QUERY_LIMIT);
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY id LIMIT {}",
            Self::select_columns(schema),
            entity.table(),
            clauses.join(" AND "),
            limit
        );

        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| row_to_json(row, schema))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert(
        &self,
        office: &str,
        entity: EntityKind,
        values: &Map<String, Value>,
    ) -> AppResult<Value> {
        let schema = self.schema(entity)?;
        let mut bound = Vec::new();
        for field in &schema.fields {
            match values.get(field.name) {
                Some(raw) if !raw.is_null() => bound.push((field, bind_value(field, raw)?)),
                _ if field.required => {
                    return Err(AppError::validation(format!(
                        "{} requires {}",
                        entity, field.name
                    )))
                }
                _ => {}
            }
        }
        reject_unknown(schema, values, false)?;

        let conn = self.db.get_connection()?;
        Self::check_references(&conn, schema, office, &bound)?;

        let mut columns = vec![OFFICE_COLUMN.to_string()];
        let mut params = vec![SqlValue::Text(office.to_string())];
        for (field, value) in bound {
            columns.push(field.name.to_string());
            params.push(value);
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                entity.table(),
                columns.join(", "),
                placeholders
            ),
            params_from_iter(params),
        )?;
        let id = conn.last_insert_rowid();

        Self::fetch_one(&conn, schema, office, id)?
            .ok_or_else(|| AppError::internal(format!("inserted {} {} vanished", entity, id)))
    }

    fn update(
        &self,
        office: &str,
        entity: EntityKind,
        id: i64,
        changes: &Map<String, Value>,
    ) -> AppResult<Value> {
        let schema = self.schema(entity)?;
        reject_unknown(schema, changes, true)?;

        let mut bound = Vec::new();
        for (key, raw) in changes {
            if key == "id" {
                continue;
            }
            if let Some(field) = schema.field(key) {
                if raw.is_null() && field.required {
                    return Err(AppError::validation(format!(
                        "{}.{} cannot be cleared",
                        entity, field.name
                    )));
                }
                let value = if raw.is_null() {
                    SqlValue::Null
                } else {
                    bind_value(field, raw)?
                };
                bound.push((field, value));
            }
        }
        if bound.is_empty() {
            return Err(AppError::validation(format!(
                "update of {} {} names no field to change",
                entity, id
            )));
        }

        let conn = self.db.get_connection()?;
        if Self::fetch_one(&conn, schema, office, id)?.is_none() {
            return Err(AppError::not_found(format!("{} {}", entity, id)));
        }
        Self::check_references(&conn, schema, office, &bound)?;

        let assignments: Vec<String> = bound
            .iter()
            .map(|(field, _)| format!("{} = ?", field.name))
            .collect();
        let mut params: Vec<SqlValue> = bound.into_iter().map(|(_, v)| v).collect();
        params.push(SqlValue::Integer(id));
        params.push(SqlValue::Text(office.to_string()));
        conn.execute(
            &format!(
                "UPDATE {} SET {}, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND {} = ?",
                entity.table(),
                assignments.join(", "),
                OFFICE_COLUMN
            ),
            params_from_iter(params),
        )?;

        Self::fetch_one(&conn, schema, office, id)?
            .ok_or_else(|| AppError::not_found(format!("{} {}", entity, id)))
    }

    fn delete(&self, office: &str, entity: EntityKind, id: i64) -> AppResult<Value> {
        let schema = self.schema(entity)?;
        let conn = self.db.get_connection()?;
        let existing = Self::fetch_one(&conn, schema, office, id)?
            .ok_or_else(|| AppError::not_found(format!("{} {}", entity, id)))?;

        let dependents = self.dependents(&conn, entity, office, id)?;
        if !dependents.is_empty() {
            return Err(AppError::validation(format!(
                "{} {} is still referenced by {}",
                entity,
                id,
                dependents.join(", ")
            )));
        }

        conn.execute(
            &format!(
                "DELETE FROM {} WHERE id = ?1 AND {} = ?2",
                entity.table(),
                OFFICE_COLUMN
            ),
            rusqlite::params![id, office],
        )?;
        Ok(existing)
    }
}

fn reject_unknown(schema: &EntitySchema, values: &Map<String, Value>, allow_id: bool) -> AppResult<()> {
    if let Some(unknown) = values
        .keys()
        .find(|k| !(allow_id && k.as_str() == "id") && schema.field(k).is_none())
    {
        return Err(AppError::validation(format!(
            "{} has no field named {}",
            schema.entity, unknown
        )));
    }
    Ok(())
}

fn as_integer(name: &str, raw: &Value) -> AppResult<i64> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| AppError::validation(format!("{} must be a whole number", name))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::validation(format!("{} must be a whole number, got {:?}", name, s))),
        _ => Err(AppError::validation(format!("{} must be a whole number", name))),
    }
}

/// Convert a JSON value to the column's SQL type.
fn bind_value(field: &FieldSpec, raw: &Value) -> AppResult<SqlValue> {
    match field.field_type {
        FieldType::Integer => Ok(SqlValue::Integer(as_integer(field.name, raw)?)),
        FieldType::Text => match raw {
            Value::String(s) => Ok(SqlValue::Text(s.trim().to_string())),
            Value::Number(n) => Ok(SqlValue::Text(n.to_string())),
            Value::Bool(b) => Ok(SqlValue::Text(b.to_string())),
            _ => Err(AppError::validation(format!("{} must be text", field.name))),
        },
        FieldType::Date => {
            let text = raw
                .as_str()
                .map(str::trim)
                .ok_or_else(|| AppError::validation(format!("{} must be a date", field.name)))?;
            let valid = NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
                || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M").is_ok()
                || NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M").is_ok()
                || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").is_ok();
            if !valid {
                return Err(AppError::validation(format!(
                    "{} must be a date like 2025-03-14, got {:?}",
                    field.name, text
                )));
            }
            Ok(SqlValue::Text(text.to_string()))
        }
    }
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn row_to_json(row: &rusqlite::Row, schema: &EntitySchema) -> rusqlite::Result<Value> {
    let mut object = Map::new();
    object.insert("id".to_string(), Value::from(row.get::<_, i64>(0)?));
    for (i, field) in schema.fields.iter().enumerate() {
        let value = match field.field_type {
            FieldType::Integer => row
                .get::<_, Option<i64>>(i + 1)?
                .map(Value::from)
                .unwrap_or(Value::Null),
            FieldType::Text | FieldType::Date => row
                .get::<_, Option<String>>(i + 1)?
                .map(Value::from)
                .unwrap_or(Value::Null),
        };
        object.insert(field.name.to_string(), value);
    }
    let base = schema.fields.len() + 1;
    object.insert(
        "created_at".to_string(),
        row.get::<_, Option<String>>(base)?.map(Value::from).unwrap_or(Value::Null),
    );
    object.insert(
        "updated_at".to_string(),
        row.get::<_, Option<String>>(base + 1)?.map(Value::from).unwrap_or(Value::Null),
    );
    Ok(Value::Object(object))
}
