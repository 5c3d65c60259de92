//! mysql-backed connection.

use mysql::prelude::{Protocol, Queryable};

use super::{statement_context, DatabaseError, DbResult, QueryRows, SchemaConnection, Value};

/// Connection to a MySQL-class server.
pub struct MysqlConnection {
    adapter: String,
    identity: String,
    conn: mysql::Conn,
}

impl MysqlConnection {
    pub fn connect(label: &str, adapter: &str, url: &str, identity: String) -> DbResult<Self> {
        let opts =
            mysql::Opts::from_url(url).map_err(|e| DatabaseError::connection_failed(label, e))?;
        let conn =
            mysql::Conn::new(opts).map_err(|e| DatabaseError::connection_failed(label, e))?;
        Ok(Self {
            adapter: adapter.to_string(),
            identity,
            conn,
        })
    }
}

impl SchemaConnection for MysqlConnection {
    fn adapter_name(&self) -> &str {
        &self.adapter
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<QueryRows> {
        let context = statement_context(sql);
        if params.is_empty() {
            // SHOW statements and friends go over the text protocol.
            let result = self
                .conn
                .query_iter(sql)
                .map_err(|e| DatabaseError::query_failed(&context, e))?;
            collect_rows(result, &context)
        } else {
            let bound: Vec<mysql::Value> = params.iter().map(to_mysql_value).collect();
            let result = self
                .conn
                .exec_iter(sql, mysql::Params::Positional(bound))
                .map_err(|e| DatabaseError::query_failed(&context, e))?;
            collect_rows(result, &context)
        }
    }
}

fn collect_rows<T: Protocol>(
    result: mysql::QueryResult<'_, '_, '_, T>,
    context: &str,
) -> DbResult<QueryRows> {
    let columns: Vec<String> = result
        .columns()
        .as_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();

    let mut rows = Vec::new();
    for row in result {
        let row = row.map_err(|e| DatabaseError::query_failed(context, e))?;
        let mut cells = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            let cell = row.as_ref(idx).cloned().unwrap_or(mysql::Value::NULL);
            cells.push(cell_to_json(cell));
        }
        rows.push(cells);
    }
    Ok(QueryRows::new(columns, rows))
}

fn to_mysql_value(value: &Value) -> mysql::Value {
    match value {
        Value::Null => mysql::Value::NULL,
        Value::Bool(b) => mysql::Value::Int(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                mysql::Value::Int(i)
            } else {
                mysql::Value::Double(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => mysql::Value::Bytes(s.clone().into_bytes()),
        other => mysql::Value::Bytes(other.to_string().into_bytes()),
    }
}

fn cell_to_json(cell: mysql::Value) -> Value {
    match cell {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        mysql::Value::Int(i) => Value::from(i),
        mysql::Value::UInt(u) => Value::from(u),
        mysql::Value::Float(f) => Value::from(f64::from(f)),
        mysql::Value::Double(d) => Value::from(d),
        mysql::Value::Date(y, mo, d, h, mi, s, _) => Value::String(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            y, mo, d, h, mi, s
        )),
        mysql::Value::Time(neg, days, h, m, s, _) => {
            let sign = if neg { "-" } else { "" };
            Value::String(format!("{}{:02}:{:02}:{:02}", sign, u32::from(h) + days * 24, m, s))
        }
    }
}
