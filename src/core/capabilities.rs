use crate::error::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    MySql,
    Sqlite,
}

impl Backend {
    /// sqlx 识别的连接串 scheme
    pub fn scheme(&self) -> &'static str {
        match self {
            Backend::Postgres => "postgres",
            Backend::MySql => "mysql",
            Backend::Sqlite => "sqlite",
        }
    }
}

/// 后端能力开关，按连接串 scheme 查表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub backend: Backend,
    /// 写操作能否通过 RETURNING 同一往返返回受影响行
    pub supports_returning: bool,
    pub supports_pagination: bool,
}

const fn caps(backend: Backend, supports_returning: bool) -> Capabilities {
    Capabilities {
        backend,
        supports_returning,
        supports_pagination: true,
    }
}

// 新增后端适配器时只需在这里登记
const REGISTRY: &[(&str, Capabilities)] = &[
    ("postgres", caps(Backend::Postgres, true)),
    ("postgresql", caps(Backend::Postgres, true)),
    ("mysql", caps(Backend::MySql, false)),
    ("mariadb", caps(Backend::MySql, false)),
    ("sqlite", caps(Backend::Sqlite, true)),
];

/// 取 scheme，去掉 SQLAlchemy 风格的 `+driver` 后缀
fn scheme_of(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once(':')?;
    let scheme = scheme.split('+').next().unwrap_or(scheme);
    (!scheme.is_empty()).then_some(scheme)
}

impl Capabilities {
    pub fn for_uri(uri: &str) -> Result<Self, QueryError> {
        let scheme = scheme_of(uri).ok_or_else(|| QueryError::UnsupportedBackend(uri_prefix(uri)))?;
        REGISTRY
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(scheme))
            .map(|(_, caps)| *caps)
            .ok_or_else(|| QueryError::UnsupportedBackend(scheme.to_string()))
    }

    /// 把连接串改写为驱动认得的规范 scheme
    pub fn connect_uri(&self, uri: &str) -> String {
        match uri.split_once(':') {
            Some((_, rest)) => format!("{}:{}", self.backend.scheme(), rest),
            None => uri.to_string(),
        }
    }
}

// 连接串可能带密码，报错时只回显 scheme 之前的片段
fn uri_prefix(uri: &str) -> String {
    uri.chars().take_while(|c| c.is_ascii_alphanumeric() || *c == '+').collect()
}
