//! 配置
//!
//! JSON 格式，所有字段都有默认值：
//!
//! ```json
//! {
//!   "timeouts": [ { "protocol": 1, "state": "ICMP", "timeout_secs": 30 } ],
//!   "log_rate_limit": { "interval_ms": 5000, "burst": 10 }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::net::RateLimit;
use crate::proto::{IcmpHandler, ProtocolHandler, ProtocolRegistry};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpvsConfig {
    #[serde(default)]
    pub timeouts: Vec<TimeoutOverride>,
    #[serde(default)]
    pub log_rate_limit: Option<RateLimitSpec>,
}

/// 覆盖某协议某状态的超时
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutOverride {
    pub protocol: u8,
    pub state: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSpec {
    pub interval_ms: u64,
    pub burst: u32,
}

impl RateLimitSpec {
    pub fn build(&self) -> RateLimit {
        RateLimit::new(Duration::from_millis(self.interval_ms), self.burst)
    }
}

impl IpvsConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// 通过管理面依次应用超时覆盖；遇到第一个错误即返回
    pub fn apply(&self, registry: &ProtocolRegistry) -> Result<(), ConfigError> {
        for o in &self.timeouts {
            registry.set_state_timeout(o.protocol, &o.state, Duration::from_secs(o.timeout_secs))?;
            info!(
                protocol = o.protocol,
                state = %o.state,
                timeout_secs = o.timeout_secs,
                "⏱️  应用状态超时"
            );
        }
        Ok(())
    }

    /// 按配置构造内置协议注册表并应用超时覆盖
    pub fn build_registry(&self) -> Result<ProtocolRegistry, ConfigError> {
        let icmp = match &self.log_rate_limit {
            Some(spec) => IcmpHandler::with_rate_limit(spec.build()),
            None => IcmpHandler::new(),
        };
        let registry =
            ProtocolRegistry::with_handlers([Arc::new(icmp) as Arc<dyn ProtocolHandler>])?;
        self.apply(&registry)?;
        Ok(registry)
    }
}
