//! 转发裁决
//!
//! 由外部转发循环消费：对每个数据包给出一个裁决。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 单个数据包的转发裁决
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// 继续转发
    Accept,
    /// 丢弃
    Drop,
    /// 已被本子系统接管，调用方不得再释放或转发
    Stolen,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Accept => "Accept",
            Verdict::Drop => "Drop",
            Verdict::Stolen => "Stolen",
        };
        f.write_str(s)
    }
}
