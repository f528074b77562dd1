//! 回放模式
//!
//! 从 JSON 文件读取一组 IPv4 数据包（十六进制），逐个交给分发器，
//! 打印每个包的裁决与统计信息。

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use ipvs_rs::config::IpvsConfig;
use ipvs_rs::error::ConfigError;
use ipvs_rs::conn::Direction;
use ipvs_rs::dispatch::Dispatcher;
use ipvs_rs::net::{Packet, Verdict};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(
    name = "ipvs-replay",
    about = "Replay an IPv4 packet trace through the IPVS protocol dispatcher"
)]
struct Args {
    /// Path to trace.json
    #[arg(long)]
    trace: PathBuf,

    /// Path to config.json (timeout overrides, log rate limit)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the timeout table of every registered protocol
    #[arg(long)]
    dump_timeouts: bool,
}

#[derive(Debug, Deserialize)]
struct TraceSpec {
    #[serde(default)]
    packets: Vec<TraceEntry>,
}

#[derive(Debug, Deserialize)]
struct TraceEntry {
    hex: String,
    #[serde(default)]
    direction: TraceDirection,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TraceDirection {
    #[default]
    In,
    Out,
    InOnly,
}

impl From<TraceDirection> for Direction {
    fn from(d: TraceDirection) -> Self {
        match d {
            TraceDirection::In => Direction::Input,
            TraceDirection::Out => Direction::Output,
            TraceDirection::InOnly => Direction::InputOnly,
        }
    }
}

#[derive(Debug, Error)]
enum ReplayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("packet {index}: {source}")]
    Hex {
        index: usize,
        #[source]
        source: hex::FromHexError,
    },
}

/// 解码一个包的十六进制表示，允许 `:` 和空白作为分隔符
fn decode_packet(index: usize, raw: &str) -> Result<Vec<u8>, ReplayError> {
    let digits: String = raw
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != ':')
        .collect();
    hex::decode(digits).map_err(|source| ReplayError::Hex { index, source })
}

fn run(args: Args) -> Result<(), ReplayError> {
    let cfg = match &args.config {
        Some(path) => IpvsConfig::load(path)?,
        None => IpvsConfig::default(),
    };
    let registry = Arc::new(cfg.build_registry()?);

    if args.dump_timeouts {
        for proto in registry.protocols() {
            let Some(snapshot) = registry.lookup(proto).and_then(|h| h.timeout_snapshot()) else {
                continue;
            };
            println!("timeouts {proto} {}", serde_json::to_string(&snapshot)?);
        }
    }

    let raw = fs::read_to_string(&args.trace)?;
    let trace: TraceSpec = serde_json::from_str(&raw)?;
    info!(packets = trace.packets.len(), "📦 开始回放");

    let dispatcher = Dispatcher::standalone(Arc::clone(&registry));
    for (i, entry) in trace.packets.iter().enumerate() {
        let bytes = decode_packet(i, &entry.hex)?;
        let pkt = match Packet::parse(bytes) {
            Ok(p) => p,
            Err(e) => {
                debug!(index = i, error = %e, "无法解析 IP 头部");
                println!("verdict {i} {} malformed: {e}", Verdict::Drop);
                continue;
            }
        };

        let verdict = dispatcher.process(&pkt, entry.direction.into());
        let line = match registry.lookup(pkt.protocol()) {
            Some(h) => h.debug_packet(&pkt, pkt.transport_offset(), "pkt"),
            None => format!("pkt: proto {} {}->{}", pkt.protocol(), pkt.ip().src, pkt.ip().dst),
        };
        println!("verdict {i} {verdict} {line}");
    }

    println!(
        "stats {}",
        serde_json::to_string(&dispatcher.stats().snapshot())?
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
