//! 协议注册表
//!
//! IP 协议号 -> 协议处理器。只在子系统启动/停止时修改（需要 `&mut self`），
//! 稳态下通过共享引用并发查找，无需加锁。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::handler::{ProtocolHandler, UNKNOWN_STATE_NAME};
use super::icmp::IcmpHandler;
use crate::error::AdminError;

#[derive(Debug, Default)]
pub struct ProtocolRegistry {
    handlers: HashMap<u8, Arc<dyn ProtocolHandler>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册所有内置协议处理器。内置处理器只有 ICMP 一个，不会冲突。
    pub fn with_builtin() -> Self {
        let icmp: Arc<dyn ProtocolHandler> = Arc::new(IcmpHandler::new());
        icmp.init();
        let reg = Self {
            handlers: HashMap::from([(icmp.descriptor().protocol, icmp)]),
        };
        reg.announce();
        reg
    }

    /// 依次注册给定的处理器。协议号重复时返回 `DuplicateProtocol`，
    /// 此前已注册的处理器随临时注册表的 `Drop` 全部注销。
    pub fn with_handlers<I>(handlers: I) -> Result<Self, AdminError>
    where
        I: IntoIterator<Item = Arc<dyn ProtocolHandler>>,
    {
        let mut reg = Self::new();
        for h in handlers {
            reg.register(h)?;
        }
        reg.announce();
        Ok(reg)
    }

    fn announce(&self) {
        let names: Vec<&str> = self
            .protocols()
            .into_iter()
            .filter_map(|p| self.lookup(p).map(|h| h.name()))
            .collect();
        info!("📋 已注册协议 ({})", names.join(", "));
    }

    /// 注册处理器并调用其 `init`
    #[tracing::instrument(skip(self, handler), fields(protocol = handler.descriptor().protocol, name = handler.name()))]
    pub fn register(&mut self, handler: Arc<dyn ProtocolHandler>) -> Result<(), AdminError> {
        let proto = handler.descriptor().protocol;
        if self.handlers.contains_key(&proto) {
            return Err(AdminError::DuplicateProtocol(proto));
        }
        handler.init();
        self.handlers.insert(proto, handler);
        debug!("协议处理器已注册");
        Ok(())
    }

    /// 调用处理器的 `exit` 后将其移除
    #[tracing::instrument(skip(self))]
    pub fn unregister(&mut self, protocol: u8) -> Result<Arc<dyn ProtocolHandler>, AdminError> {
        let handler = self
            .handlers
            .remove(&protocol)
            .ok_or(AdminError::NotRegistered(protocol))?;
        handler.exit();
        debug!(name = handler.name(), "协议处理器已注销");
        Ok(handler)
    }

    pub fn lookup(&self, protocol: u8) -> Option<&Arc<dyn ProtocolHandler>> {
        self.handlers.get(&protocol)
    }

    /// 已注册的协议号（升序）
    pub fn protocols(&self) -> Vec<u8> {
        let mut v: Vec<u8> = self.handlers.keys().copied().collect();
        v.sort_unstable();
        v
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// 管理面入口：按协议号定位处理器并修改其状态超时
    pub fn set_state_timeout(
        &self,
        protocol: u8,
        state: &str,
        value: Duration,
    ) -> Result<(), AdminError> {
        self.lookup(protocol)
            .ok_or(AdminError::NotRegistered(protocol))?
            .set_state_timeout(state, value)
    }

    pub fn state_name(&self, protocol: u8, state: usize) -> &str {
        self.lookup(protocol)
            .map(|h| h.state_name(state))
            .unwrap_or(UNKNOWN_STATE_NAME)
    }

    /// 注销全部处理器
    pub fn cleanup(&mut self) {
        for proto in self.protocols() {
            if let Err(e) = self.unregister(proto) {
                debug!(error = %e, "注销协议处理器失败");
            }
        }
    }
}

impl Drop for ProtocolRegistry {
    fn drop(&mut self) {
        self.cleanup();
    }
}
