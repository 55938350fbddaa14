use crate::core::schema_infer::InferredTable;
use crate::core::value_parser::{self, TypedValue};
use crate::error::QueryError;
use crate::models::filter::{
    Conjunction, FieldCatalog, FilterClause, FilterNode, Operator, RuleProperties,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

/// 可组合的布尔条件
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    Compare {
        column: String,
        op: Comparison,
        value: TypedValue,
    },
    Like {
        column: String,
        pattern: TypedValue,
        negated: bool,
    },
    Between {
        column: String,
        low: TypedValue,
        high: TypedValue,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

/// 编译整个过滤子句；没有过滤或整棵树无约束时返回常量 TRUE
pub fn compile_clause(
    filters: Option<&FilterClause>,
    table: &InferredTable,
) -> Result<Predicate, QueryError> {
    let Some(filters) = filters else {
        return Ok(Predicate::True);
    };
    Ok(compile(&filters.tree, table, &filters.fields)?.unwrap_or(Predicate::True))
}

/// 递归编译一个节点，`None` 表示"无约束"
pub fn compile(
    node: &FilterNode,
    table: &InferredTable,
    fields: &FieldCatalog,
) -> Result<Option<Predicate>, QueryError> {
    match node {
        FilterNode::Group {
            properties,
            children1,
        } => {
            let mut children = Vec::with_capacity(children1.len());
            for child in children1 {
                if let Some(p) = compile(child, table, fields)? {
                    children.push(p);
                }
            }
            if children.is_empty() {
                return Ok(None);
            }
            let combined = match properties.conjunction {
                Conjunction::And => Predicate::And(children),
                Conjunction::Or => Predicate::Or(children),
            };
            if properties.negated.unwrap_or(false) {
                Ok(Some(Predicate::Not(Box::new(combined))))
            } else {
                Ok(Some(combined))
            }
        }
        FilterNode::Rule { properties } => compile_rule(properties, table, fields),
    }
}

fn compile_rule(
    rule: &RuleProperties,
    table: &InferredTable,
    fields: &FieldCatalog,
) -> Result<Option<Predicate>, QueryError> {
    let Some(field) = rule.field.as_deref() else {
        return Ok(None);
    };
    let column = table.column(field)?.to_string();
    let operator = rule
        .operator
        .ok_or_else(|| QueryError::UnknownOperator("<absent>".to_string()))?;

    // 规则没声明类型时退回字段目录里的类型
    let declared = fields.get(field).map(|f| f.value_type);
    let values = rule
        .operands
        .iter()
        .map(|o| value_parser::parse(o.value_type.or(declared), &o.value))
        .collect::<Result<Vec<_>, _>>()?;
    // 单值操作符只取第一个值，缺省视为 null
    let first = || values.first().cloned().unwrap_or(TypedValue::Null);

    let predicate = match operator {
        Operator::Equal => compare_or_null(column, Comparison::Eq, first()),
        Operator::NotEqual => compare_or_null(column, Comparison::Ne, first()),
        Operator::Less => compare(column, Comparison::Lt, first()),
        Operator::LessOrEqual => compare(column, Comparison::Le, first()),
        Operator::Greater => compare(column, Comparison::Gt, first()),
        Operator::GreaterOrEqual => compare(column, Comparison::Ge, first()),
        Operator::Like => like(column, first(), false),
        Operator::NotLike => like(column, first(), true),
        Operator::StartsWith => {
            let pattern = format!("{}%", first().pattern_text());
            like(column, TypedValue::Text(pattern), false)
        }
        Operator::EndsWith => {
            let pattern = format!("%{}", first().pattern_text());
            like(column, TypedValue::Text(pattern), false)
        }
        Operator::Between => between(column, operator, &values)?,
        Operator::NotBetween => Predicate::Not(Box::new(between(column, operator, &values)?)),
        Operator::IsNull => Predicate::IsNull {
            column,
            negated: false,
        },
        Operator::IsNotNull => Predicate::IsNull {
            column,
            negated: true,
        },
        Operator::IsEmpty => compare(column, Comparison::Eq, TypedValue::Text(String::new())),
        Operator::IsNotEmpty => compare(column, Comparison::Ne, TypedValue::Text(String::new())),
    };
    Ok(Some(predicate))
}

fn compare(column: String, op: Comparison, value: TypedValue) -> Predicate {
    Predicate::Compare { column, op, value }
}

// = NULL / <> NULL 恒为未知，改写成 IS [NOT] NULL
fn compare_or_null(column: String, op: Comparison, value: TypedValue) -> Predicate {
    if value.is_null() {
        Predicate::IsNull {
            column,
            negated: op == Comparison::Ne,
        }
    } else {
        compare(column, op, value)
    }
}

// LIKE 右侧按文本匹配，数值等取值先转成模式文本
fn like(column: String, pattern: TypedValue, negated: bool) -> Predicate {
    let pattern = match pattern {
        TypedValue::Null => TypedValue::Null,
        TypedValue::Text(text) => TypedValue::Text(text),
        other => TypedValue::Text(other.pattern_text()),
    };
    Predicate::Like {
        column,
        pattern,
        negated,
    }
}

fn between(
    column: String,
    operator: Operator,
    values: &[TypedValue],
) -> Result<Predicate, QueryError> {
    match values {
        [low, high, ..] => Ok(Predicate::Between {
            column,
            low: low.clone(),
            high: high.clone(),
        }),
        _ => Err(QueryError::Arity {
            operator: operator.to_string(),
            expected: 2,
            found: values.len(),
        }),
    }
}
