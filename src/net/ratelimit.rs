//! 日志限速
//!
//! 固定窗口计数：每个 `interval` 内最多放行 `burst` 条，其余计入被抑制数，
//! 在下一个窗口第一条放行时一并报告。

use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_BURST: u32 = 10;

/// 限速判断结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// 放行；`suppressed` 为上一个窗口中被丢弃的条数
    Allow { suppressed: u32 },
    Suppress,
}

#[derive(Debug, Default)]
struct Window {
    start: Option<Instant>,
    printed: u32,
    missed: u32,
}

#[derive(Debug)]
pub struct RateLimit {
    interval: Duration,
    burst: u32,
    window: Mutex<Window>,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, DEFAULT_BURST)
    }
}

impl RateLimit {
    pub fn new(interval: Duration, burst: u32) -> Self {
        Self {
            interval,
            burst,
            window: Mutex::new(Window::default()),
        }
    }

    pub fn check(&self) -> RateDecision {
        self.check_at(Instant::now())
    }

    pub fn check_at(&self, now: Instant) -> RateDecision {
        // 计数器在 panic 后仍然可用
        let mut w = self.window.lock().unwrap_or_else(|e| e.into_inner());

        let expired = match w.start {
            None => true,
            Some(start) => now.saturating_duration_since(start) >= self.interval,
        };
        if expired {
            w.start = Some(now);
            w.printed = 0;
        }

        if w.printed < self.burst {
            w.printed += 1;
            let suppressed = if w.printed == 1 {
                std::mem::take(&mut w.missed)
            } else {
                0
            };
            RateDecision::Allow { suppressed }
        } else {
            w.missed = w.missed.saturating_add(1);
            RateDecision::Suppress
        }
    }
}
