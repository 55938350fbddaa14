use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use sqlx::{mysql::MySqlRow, postgres::PgRow, sqlite::SqliteRow, Column, Row, TypeInfo, ValueRef};
use std::fmt::Write;
use uuid::Uuid;

// 二进制列统一输出为小写十六进制
fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

pub fn pg_row_to_json(row: &PgRow) -> Value {
    let mut map = Map::new();

    for col in row.columns() {
        let idx = col.ordinal();
        let type_name = col.type_info().name(); // 数据库原生类型名，如 "INT4", "NUMERIC"

        let val = match type_name {
            "INT2" => json!(row.try_get::<Option<i16>, _>(idx).unwrap_or(None)),
            "INT4" => json!(row.try_get::<Option<i32>, _>(idx).unwrap_or(None)),
            "INT8" => json!(row.try_get::<Option<i64>, _>(idx).unwrap_or(None)),
            "FLOAT4" => json!(row.try_get::<Option<f32>, _>(idx).unwrap_or(None)),
            "FLOAT8" => json!(row.try_get::<Option<f64>, _>(idx).unwrap_or(None)),
            "NUMERIC" => {
                // 金额类保持精度，输出字符串
                let v: Option<Decimal> = row.try_get(idx).unwrap_or(None);
                json!(v.map(|d| d.to_string()))
            }
            "BOOL" => json!(row.try_get::<Option<bool>, _>(idx).unwrap_or(None)),
            "DATE" => json!(row
                .try_get::<Option<NaiveDate>, _>(idx)
                .unwrap_or(None)
                .map(|d| d.to_string())),
            "TIME" => json!(row
                .try_get::<Option<NaiveTime>, _>(idx)
                .unwrap_or(None)
                .map(|t| t.to_string())),
            "TIMESTAMP" => json!(row
                .try_get::<Option<NaiveDateTime>, _>(idx)
                .unwrap_or(None)
                .map(|dt| dt.to_string())),
            "TIMESTAMPTZ" => json!(row
                .try_get::<Option<DateTime<Utc>>, _>(idx)
                .unwrap_or(None)
                .map(|dt| dt.to_rfc3339())),
            "UUID" => json!(row
                .try_get::<Option<Uuid>, _>(idx)
                .unwrap_or(None)
                .map(|u| u.to_string())),
            "JSON" | "JSONB" => row
                .try_get::<Option<Value>, _>(idx)
                .unwrap_or(None)
                .unwrap_or(Value::Null),
            "BYTEA" => json!(row
                .try_get::<Option<Vec<u8>>, _>(idx)
                .unwrap_or(None)
                .map(|b| to_hex(&b))),
            _ => {
                // 未知类型尝试转为字符串
                json!(row.try_get::<Option<String>, _>(idx).unwrap_or(None))
            }
        };

        map.insert(col.name().to_string(), val);
    }

    Value::Object(map)
}

pub fn mysql_row_to_json(row: &MySqlRow) -> Value {
    let mut map = Map::new();

    for col in row.columns() {
        let idx = col.ordinal();
        let type_name = col.type_info().name(); // 如 "INT", "DECIMAL", "VARCHAR", "DATE"

        let val = match type_name {
            "BOOLEAN" => json!(row.try_get::<Option<bool>, _>(idx).unwrap_or(None)),
            "TINYINT" | "SMALLINT" | "INT" | "MEDIUMINT" | "BIGINT" => {
                json!(row.try_get::<Option<i64>, _>(idx).unwrap_or(None))
            }
            t if t.ends_with("UNSIGNED") => {
                json!(row.try_get::<Option<u64>, _>(idx).unwrap_or(None))
            }
            "FLOAT" | "DOUBLE" => json!(row.try_get::<Option<f64>, _>(idx).unwrap_or(None)),
            "DECIMAL" => {
                let v: Option<Decimal> = row.try_get(idx).unwrap_or(None);
                json!(v.map(|d| d.to_string()))
            }
            "DATE" => json!(row
                .try_get::<Option<NaiveDate>, _>(idx)
                .unwrap_or(None)
                .map(|d| d.to_string())),
            "TIME" => json!(row
                .try_get::<Option<NaiveTime>, _>(idx)
                .unwrap_or(None)
                .map(|t| t.to_string())),
            "DATETIME" => json!(row
                .try_get::<Option<NaiveDateTime>, _>(idx)
                .unwrap_or(None)
                .map(|dt| dt.to_string())),
            "TIMESTAMP" => json!(row
                .try_get::<Option<DateTime<Utc>>, _>(idx)
                .unwrap_or(None)
                .map(|dt| dt.to_rfc3339())),
            "JSON" => row
                .try_get::<Option<Value>, _>(idx)
                .unwrap_or(None)
                .unwrap_or(Value::Null),
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => json!(row
                .try_get::<Option<Vec<u8>>, _>(idx)
                .unwrap_or(None)
                .map(|b| to_hex(&b))),
            _ => json!(row.try_get::<Option<String>, _>(idx).unwrap_or(None)),
        };

        map.insert(col.name().to_string(), val);
    }

    Value::Object(map)
}

/// SQLite 按值的存储类型解码，不看列的声明类型
pub fn sqlite_row_to_json(row: &SqliteRow) -> Value {
    let mut map = Map::new();

    for col in row.columns() {
        let idx = col.ordinal();
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if !raw.is_null() => raw.type_info().name().to_string(),
            _ => {
                map.insert(col.name().to_string(), Value::Null);
                continue;
            }
        };

        let val = match storage.as_str() {
            "INTEGER" => json!(row.try_get::<Option<i64>, _>(idx).unwrap_or(None)),
            "REAL" => json!(row.try_get::<Option<f64>, _>(idx).unwrap_or(None)),
            "BLOB" => json!(row
                .try_get::<Option<Vec<u8>>, _>(idx)
                .unwrap_or(None)
                .map(|b| to_hex(&b))),
            _ => json!(row.try_get::<Option<String>, _>(idx).unwrap_or(None)),
        };

        map.insert(col.name().to_string(), val);
    }

    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_encodes_bytes() {
        assert_eq!(to_hex(&[0x00, 0xab, 0x10]), "00ab10");
        assert_eq!(to_hex(&[]), "");
    }
}
