//! postgres-backed connection.

use postgres::types::{ToSql, Type};

use super::{statement_context, DatabaseError, DbResult, QueryRows, SchemaConnection, Value};

/// Connection to a PostgreSQL-class server.
///
/// Catalog parameters are bound as text; the catalog's `name` columns
/// compare against text without explicit casts. Exotic result types are
/// cast to text inside the dialect's SQL, so cell conversion only has to
/// cover booleans, integers, floats, and strings.
pub struct PgConnection {
    adapter: String,
    identity: String,
    client: postgres::Client,
}

impl PgConnection {
    pub fn connect(label: &str, adapter: &str, url: &str, identity: String) -> DbResult<Self> {
        let client = postgres::Client::connect(url, postgres::NoTls)
            .map_err(|e| DatabaseError::connection_failed(label, e))?;
        Ok(Self {
            adapter: adapter.to_string(),
            identity,
            client,
        })
    }
}

impl SchemaConnection for PgConnection {
    fn adapter_name(&self) -> &str {
        &self.adapter
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<QueryRows> {
        let context = statement_context(sql);
        let stmt = self
            .client
            .prepare(sql)
            .map_err(|e| DatabaseError::query_failed(&context, e))?;
        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();

        let owned: Vec<Option<String>> = params.iter().map(to_text_param).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            owned.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let result = self
            .client
            .query(&stmt, &refs)
            .map_err(|e| DatabaseError::query_failed(&context, e))?;

        let mut rows = Vec::with_capacity(result.len());
        for row in &result {
            let mut cells = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                cells.push(cell_to_json(row, idx)?);
            }
            rows.push(cells);
        }
        Ok(QueryRows::new(columns, rows))
    }
}

fn to_text_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn cell_to_json(row: &postgres::Row, idx: usize) -> DbResult<Value> {
    let ty = row.columns()[idx].type_().clone();
    let column = row.columns()[idx].name().to_string();
    let shape_err = |e: postgres::Error| {
        DatabaseError::unexpected_shape(format!("column '{}' ({}): {}", column, ty, e))
    };

    let value = if ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx).map_err(shape_err)?.map(Value::from)
    } else if ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)
            .map_err(shape_err)?
            .map(|v| Value::from(i64::from(v)))
    } else if ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)
            .map_err(shape_err)?
            .map(|v| Value::from(i64::from(v)))
    } else if ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx).map_err(shape_err)?.map(Value::from)
    } else if ty == Type::OID {
        row.try_get::<_, Option<u32>>(idx)
            .map_err(shape_err)?
            .map(|v| Value::from(u64::from(v)))
    } else if ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)
            .map_err(shape_err)?
            .map(|v| Value::from(f64::from(v)))
    } else if ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx).map_err(shape_err)?.map(Value::from)
    } else if ty == Type::CHAR {
        // "char" columns such as relkind come back as a single byte.
        row.try_get::<_, Option<i8>>(idx)
            .map_err(shape_err)?
            .map(|v| Value::String((v as u8 as char).to_string()))
    } else {
        // text, varchar, name, bpchar, and anything the dialect cast to text
        match row.try_get::<_, Option<String>>(idx) {
            Ok(v) => v.map(Value::String),
            Err(_) => {
                tracing::debug!(column = %column, r#type = %ty, "unconvertible cell, substituting null");
                None
            }
        }
    };

    Ok(value.unwrap_or(Value::Null))
}
