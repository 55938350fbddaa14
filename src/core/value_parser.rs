use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;

use crate::error::QueryError;
use crate::models::filter::ValueType;

/// 可绑定到语句参数的取值
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    Json(Value),
}

impl TypedValue {
    /// 不做类型检查的直通转换
    pub fn from_json(raw: &Value) -> Self {
        match raw {
            Value::Null => TypedValue::Null,
            Value::Bool(b) => TypedValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => TypedValue::Int(i),
                None => TypedValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => TypedValue::Text(s.clone()),
            other => TypedValue::Json(other.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// LIKE 模式拼接时使用的文本形式
    pub fn pattern_text(&self) -> String {
        match self {
            TypedValue::Null => String::new(),
            TypedValue::Bool(b) => b.to_string(),
            TypedValue::Int(i) => i.to_string(),
            TypedValue::Float(f) => f.to_string(),
            TypedValue::Text(s) => s.clone(),
            TypedValue::Date(d) => d.to_string(),
            TypedValue::Time(t) => t.to_string(),
            TypedValue::DateTime(dt) => dt.to_string(),
            TypedValue::DateTimeUtc(dt) => dt.to_rfc3339(),
            TypedValue::Json(v) => v.to_string(),
        }
    }
}

/// 按声明类型把线上取值解析为 `TypedValue`
///
/// null 永远解析为 null；date/time/datetime/datetime-custom 按 ISO-8601 解析；
/// tree 类选择器不支持；其余类型原样透传。
pub fn parse(value_type: Option<ValueType>, raw: &Value) -> Result<TypedValue, QueryError> {
    if raw.is_null() {
        return Ok(TypedValue::Null);
    }
    let Some(value_type) = value_type else {
        return Ok(TypedValue::from_json(raw));
    };
    match value_type {
        ValueType::Treeselect | ValueType::Treemultiselect => {
            Err(QueryError::UnsupportedValueType(value_type.as_str().to_string()))
        }
        ValueType::Date => {
            let s = expect_str(value_type, raw)?;
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(TypedValue::Date)
                .map_err(|e| format_error(value_type, raw, e))
        }
        ValueType::Time => {
            let s = expect_str(value_type, raw)?;
            parse_time(s)
                .map(TypedValue::Time)
                .map_err(|e| format_error(value_type, raw, e))
        }
        ValueType::Datetime | ValueType::DatetimeCustom => {
            let s = expect_str(value_type, raw)?;
            parse_datetime(s).map_err(|e| format_error(value_type, raw, e))
        }
        ValueType::Text
        | ValueType::Number
        | ValueType::Boolean
        | ValueType::Select
        | ValueType::Multiselect
        | ValueType::NumberCustom
        | ValueType::BooleanCustom
        | ValueType::SelectCustom => Ok(TypedValue::from_json(raw)),
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
}

fn parse_datetime(s: &str) -> Result<TypedValue, chrono::ParseError> {
    // 带时区偏移的统一转为 UTC
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(TypedValue::DateTimeUtc(dt.with_timezone(&Utc)));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(TypedValue::DateTime(dt));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| TypedValue::DateTime(d.and_time(NaiveTime::MIN)))
}

fn expect_str(value_type: ValueType, raw: &Value) -> Result<&str, QueryError> {
    raw.as_str().ok_or_else(|| QueryError::ValueFormat {
        value_type: value_type.as_str().to_string(),
        value: raw.to_string(),
        reason: "expected an ISO-8601 string".to_string(),
    })
}

fn format_error(value_type: ValueType, raw: &Value, err: chrono::ParseError) -> QueryError {
    QueryError::ValueFormat {
        value_type: value_type.as_str().to_string(),
        value: raw.to_string(),
        reason: err.to_string(),
    }
}
