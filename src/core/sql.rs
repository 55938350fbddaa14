use crate::core::capabilities::Backend;
use crate::core::filter_compiler::Predicate;
use crate::core::value_parser::TypedValue;

/// 按方言拼接 SQL 文本，取值一律走位置参数
pub struct SqlWriter {
    backend: Backend,
    sql: String,
    params: Vec<TypedValue>,
}

impl SqlWriter {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub fn push(&mut self, fragment: &str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    pub fn push_ident(&mut self, ident: &str) -> &mut Self {
        let quote = match self.backend {
            Backend::MySql => '`',
            Backend::Postgres | Backend::Sqlite => '"',
        };
        self.sql.push(quote);
        for ch in ident.chars() {
            if ch == quote {
                self.sql.push(quote);
            }
            self.sql.push(ch);
        }
        self.sql.push(quote);
        self
    }

    /// null 直接写成字面量，不绑定参数
    ///
    /// Postgres 不会把 TEXT 参数隐式转换成 date/uuid/枚举等列类型，且参数一律按二进制格式发送；
    /// 透传字符串因此写成未定类型的字面量，由列类型决定如何解析。
    pub fn push_value(&mut self, value: TypedValue) -> &mut Self {
        match value {
            TypedValue::Null => self.push("NULL"),
            TypedValue::Text(s) if self.backend == Backend::Postgres && !s.contains('\0') => {
                self.push_pg_literal(&s)
            }
            value => self.push_param(value),
        }
    }

    // E'' 字面量里反斜杠总是转义符，与 standard_conforming_strings 设置无关
    fn push_pg_literal(&mut self, text: &str) -> &mut Self {
        self.sql.push_str("E'");
        for ch in text.chars() {
            match ch {
                '\'' => self.sql.push_str("''"),
                '\\' => self.sql.push_str("\\\\"),
                _ => self.sql.push(ch),
            }
        }
        self.sql.push('\'');
        self
    }

    fn push_param(&mut self, value: TypedValue) -> &mut Self {
        self.params.push(value);
        match self.backend {
            Backend::Postgres => {
                let placeholder = format!("${}", self.params.len());
                self.sql.push_str(&placeholder);
            }
            Backend::MySql | Backend::Sqlite => self.sql.push('?'),
        }
        self
    }

    pub fn push_predicate(&mut self, predicate: &Predicate) -> &mut Self {
        match predicate {
            Predicate::True => {
                self.push("TRUE");
            }
            Predicate::Compare { column, op, value } => {
                self.push_ident(column)
                    .push(" ")
                    .push(op.as_sql())
                    .push(" ")
                    .push_value(value.clone());
            }
            Predicate::Like {
                column,
                pattern,
                negated,
            } => {
                let keyword = if *negated { " NOT LIKE " } else { " LIKE " };
                self.push_ident(column).push(keyword).push_value(pattern.clone());
            }
            Predicate::Between { column, low, high } => {
                self.push_ident(column)
                    .push(" BETWEEN ")
                    .push_value(low.clone())
                    .push(" AND ")
                    .push_value(high.clone());
            }
            Predicate::IsNull { column, negated } => {
                let keyword = if *negated { " IS NOT NULL" } else { " IS NULL" };
                self.push_ident(column).push(keyword);
            }
            Predicate::And(children) => self.push_joined(children, " AND "),
            Predicate::Or(children) => self.push_joined(children, " OR "),
            Predicate::Not(inner) => {
                self.push("NOT (").push_predicate(inner).push(")");
            }
        }
        self
    }

    fn push_joined(&mut self, children: &[Predicate], separator: &str) {
        if let [only] = children {
            self.push_predicate(only);
            return;
        }
        self.push("(");
        for (idx, child) in children.iter().enumerate() {
            if idx > 0 {
                self.push(separator);
            }
            self.push_predicate(child);
        }
        self.push(")");
    }

    pub fn finish(self) -> (String, Vec<TypedValue>) {
        (self.sql, self.params)
    }
}
