//! 追踪初始化、读取周期 ID 与读取计数。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 读取计数快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub cycles_aborted: u64,
    pub registers_read: u64,
    pub registers_skipped: u64,
    pub register_exceptions: u64,
}

/// 进程级读取计数。
pub struct ReadMetrics {
    cycles_started: AtomicU64,
    cycles_completed: AtomicU64,
    cycles_aborted: AtomicU64,
    registers_read: AtomicU64,
    registers_skipped: AtomicU64,
    register_exceptions: AtomicU64,
}

impl ReadMetrics {
    pub fn new() -> Self {
        Self {
            cycles_started: AtomicU64::new(0),
            cycles_completed: AtomicU64::new(0),
            cycles_aborted: AtomicU64::new(0),
            registers_read: AtomicU64::new(0),
            registers_skipped: AtomicU64::new(0),
            register_exceptions: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_aborted: self.cycles_aborted.load(Ordering::Relaxed),
            registers_read: self.registers_read.load(Ordering::Relaxed),
            registers_skipped: self.registers_skipped.load(Ordering::Relaxed),
            register_exceptions: self.register_exceptions.load(Ordering::Relaxed),
        }
    }
}

impl Default for ReadMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<ReadMetrics> = OnceLock::new();

/// 获取全局计数实例。
pub fn metrics() -> &'static ReadMetrics {
    METRICS.get_or_init(ReadMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的读取周期 ID。
pub fn new_cycle_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录读取周期开始。
pub fn record_cycle_started() {
    metrics().cycles_started.fetch_add(1, Ordering::Relaxed);
}

/// 记录读取周期完成。
pub fn record_cycle_completed() {
    metrics().cycles_completed.fetch_add(1, Ordering::Relaxed);
}

/// 记录读取周期因故障中止。
pub fn record_cycle_aborted() {
    metrics().cycles_aborted.fetch_add(1, Ordering::Relaxed);
}

/// 记录成功读取并解码的寄存器。
pub fn record_register_read() {
    metrics().registers_read.fetch_add(1, Ordering::Relaxed);
}

/// 记录因型号不匹配跳过的寄存器。
pub fn record_register_skipped() {
    metrics().registers_skipped.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备以异常拒绝的寄存器。
pub fn record_register_exception() {
    metrics()
        .register_exceptions
        .fetch_add(1, Ordering::Relaxed);
}
