use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::QueryError;

/// 过滤树节点：规则 (rule) 或分组 (group)
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterNode {
    Rule {
        properties: RuleProperties,
    },
    Group {
        properties: GroupProperties,
        #[serde(default)]
        children1: Vec<FilterNode>,
    },
}

impl FilterNode {
    /// 树的嵌套层数，单条规则为 1
    pub fn depth(&self) -> usize {
        match self {
            FilterNode::Rule { .. } => 1,
            FilterNode::Group { children1, .. } => {
                1 + children1.iter().map(FilterNode::depth).max().unwrap_or(0)
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupProperties {
    pub conjunction: Conjunction,
    #[serde(rename = "not", default)]
    pub negated: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Conjunction {
    And,
    Or,
}

impl TryFrom<String> for Conjunction {
    type Error = QueryError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        match tag.as_str() {
            "AND" => Ok(Conjunction::And),
            "OR" => Ok(Conjunction::Or),
            _ => Err(QueryError::UnknownConjunction(tag)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Like,
    NotLike,
    StartsWith,
    EndsWith,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "equal",
            Operator::NotEqual => "not_equal",
            Operator::Less => "less",
            Operator::LessOrEqual => "less_or_equal",
            Operator::Greater => "greater",
            Operator::GreaterOrEqual => "greater_or_equal",
            Operator::Like => "like",
            Operator::NotLike => "not_like",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::Between => "between",
            Operator::NotBetween => "not_between",
            Operator::IsNull => "is_null",
            Operator::IsNotNull => "is_not_null",
            Operator::IsEmpty => "is_empty",
            Operator::IsNotEmpty => "is_not_empty",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Operator {
    type Error = QueryError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        let op = match tag.as_str() {
            "equal" => Operator::Equal,
            "not_equal" => Operator::NotEqual,
            "less" => Operator::Less,
            "less_or_equal" => Operator::LessOrEqual,
            "greater" => Operator::Greater,
            "greater_or_equal" => Operator::GreaterOrEqual,
            "like" => Operator::Like,
            "not_like" => Operator::NotLike,
            "starts_with" => Operator::StartsWith,
            "ends_with" => Operator::EndsWith,
            "between" => Operator::Between,
            "not_between" => Operator::NotBetween,
            "is_null" => Operator::IsNull,
            "is_not_null" => Operator::IsNotNull,
            "is_empty" => Operator::IsEmpty,
            "is_not_empty" => Operator::IsNotEmpty,
            _ => return Err(QueryError::UnknownOperator(tag)),
        };
        Ok(op)
    }
}

/// 字段声明的取值类型（前端查询构建器的类型名）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ValueType {
    Text,
    Number,
    Date,
    Time,
    Datetime,
    Select,
    Multiselect,
    Treeselect,
    Treemultiselect,
    Boolean,
    NumberCustom,
    BooleanCustom,
    DatetimeCustom,
    SelectCustom,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Number => "number",
            ValueType::Date => "date",
            ValueType::Time => "time",
            ValueType::Datetime => "datetime",
            ValueType::Select => "select",
            ValueType::Multiselect => "multiselect",
            ValueType::Treeselect => "treeselect",
            ValueType::Treemultiselect => "treemultiselect",
            ValueType::Boolean => "boolean",
            ValueType::NumberCustom => "number-custom",
            ValueType::BooleanCustom => "boolean-custom",
            ValueType::DatetimeCustom => "datetime-custom",
            ValueType::SelectCustom => "select-custom",
        }
    }
}

impl TryFrom<String> for ValueType {
    type Error = QueryError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        let vt = match tag.as_str() {
            "text" => ValueType::Text,
            "number" => ValueType::Number,
            "date" => ValueType::Date,
            "time" => ValueType::Time,
            "datetime" => ValueType::Datetime,
            "select" => ValueType::Select,
            "multiselect" => ValueType::Multiselect,
            "treeselect" => ValueType::Treeselect,
            "treemultiselect" => ValueType::Treemultiselect,
            "boolean" => ValueType::Boolean,
            "number-custom" => ValueType::NumberCustom,
            "boolean-custom" => ValueType::BooleanCustom,
            "datetime-custom" => ValueType::DatetimeCustom,
            "select-custom" => ValueType::SelectCustom,
            _ => return Err(QueryError::UnsupportedValueType(tag)),
        };
        Ok(vt)
    }
}

/// 一个待比较的值及其声明类型
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub value: Value,
    pub value_type: Option<ValueType>,
}

/// 规则属性。线上格式的 `value` / `valueType` 是两个平行数组，
/// 反序列化时合并为 `operands`，长度不一致直接拒绝。
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawRuleProperties")]
pub struct RuleProperties {
    pub field: Option<String>,
    pub operator: Option<Operator>,
    pub operands: Vec<Operand>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRuleProperties {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    operator: Option<Operator>,
    #[serde(default)]
    value: Vec<Value>,
    #[serde(default)]
    value_type: Option<Vec<ValueType>>,
}

impl TryFrom<RawRuleProperties> for RuleProperties {
    type Error = QueryError;

    fn try_from(raw: RawRuleProperties) -> Result<Self, Self::Error> {
        let operands = match raw.value_type {
            Some(types) if types.len() != raw.value.len() => {
                return Err(QueryError::RequestShape(format!(
                    "rule on {:?} has {} values but {} value types",
                    raw.field,
                    raw.value.len(),
                    types.len()
                )));
            }
            Some(types) => raw
                .value
                .into_iter()
                .zip(types)
                .map(|(value, vt)| Operand {
                    value,
                    value_type: Some(vt),
                })
                .collect(),
            None => raw
                .value
                .into_iter()
                .map(|value| Operand {
                    value,
                    value_type: None,
                })
                .collect(),
        };
        Ok(RuleProperties {
            field: raw.field,
            operator: raw.operator,
            operands,
        })
    }
}

/// 字段目录中的一项
#[derive(Debug, Clone, Deserialize)]
pub struct TableField {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub label: String,
}

pub type FieldCatalog = BTreeMap<String, TableField>;

/// 过滤子句：过滤树 + 字段目录
#[derive(Debug, Clone, Deserialize)]
pub struct FilterClause {
    pub tree: FilterNode,
    #[serde(default)]
    pub fields: FieldCatalog,
}
