use anyhow::Context;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// 进程级配置，来自环境变量（启动时先加载 .env）
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: SocketAddr,
    /// 过滤树允许的最大嵌套层数
    pub max_filter_depth: usize,
    pub statement_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_filter_depth: 32,
            statement_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(addr) = lookup("QUERY_GATEWAY_ADDR") {
            config.addr = addr
                .parse()
                .with_context(|| format!("QUERY_GATEWAY_ADDR is not a socket address: {addr}"))?;
        }
        if let Some(depth) = lookup("QUERY_MAX_FILTER_DEPTH") {
            config.max_filter_depth = depth
                .parse()
                .with_context(|| format!("QUERY_MAX_FILTER_DEPTH is not a number: {depth}"))?;
        }
        if let Some(secs) = lookup("QUERY_STATEMENT_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("QUERY_STATEMENT_TIMEOUT_SECS is not a number: {secs}"))?;
            config.statement_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}
