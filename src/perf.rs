// ==========================================
// 棒料发料窗口 - 性能统计
// ==========================================
// SQL 计数与慢查询日志都基于 rusqlite 的 profile 回调（每条语句执行完成时触发一次）
// legacy trace 与 profile 不能同时生效：sqlite3_profile 会清除 legacy trace 标志位
// 计数器为线程局部：PerfGuard 必须与 SQL 在同一线程（spawn_blocking 闭包内）创建
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const ENV_PERF_SQL: &str = "MATERIAL_ISSUE_PERF_SQL";
pub const ENV_SLOW_SQL_MS: &str = "MATERIAL_ISSUE_SLOW_SQL_MS";

static SQL_TRACING_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static ACTIVE_GUARDS: Cell<u32> = Cell::new(0);
    static STATEMENTS: Cell<u64> = Cell::new(0);
    static SLOW_STATEMENTS: Cell<u64> = Cell::new(0);
}

/// SQL 追踪开关
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTraceSettings {
    pub enabled: bool,
    pub slow_sql_ms: u64,
}

impl SqlTraceSettings {
    /// 从环境变量读取；未设置时 Debug 构建开启、Release 关闭
    pub fn from_env() -> Self {
        let enabled = std::env::var(ENV_PERF_SQL)
            .map(|v| is_truthy(&v))
            .unwrap_or(cfg!(debug_assertions));
        let slow_sql_ms = std::env::var(ENV_SLOW_SQL_MS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self {
            enabled,
            slow_sql_ms,
        }
    }
}

fn is_truthy(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn shorten_sql(sql: &str, max_chars: usize) -> String {
    let flat: String = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let head: String = flat.chars().take(max_chars).collect();
    format!("{}…", head)
}

/// 在连接上安装 SQL profile 回调
pub fn install_sqlite_tracing(conn: &mut Connection) {
    apply_sqlite_tracing(conn, SqlTraceSettings::from_env());
}

pub fn apply_sqlite_tracing(conn: &mut Connection, settings: SqlTraceSettings) {
    SQL_TRACING_ENABLED.store(settings.enabled, Ordering::Relaxed);
    SLOW_SQL_MS.store(settings.slow_sql_ms, Ordering::Relaxed);

    if settings.enabled {
        conn.profile(Some(on_profile));
    } else {
        // 复用连接时清掉旧回调
        conn.profile(None);
    }
}

fn guard_active() -> bool {
    ACTIVE_GUARDS.with(|g| g.get() > 0)
}

fn on_profile(sql: &str, duration: Duration) {
    if !SQL_TRACING_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    if guard_active() {
        STATEMENTS.with(|c| c.set(c.get().saturating_add(1)));
    }

    let threshold = SLOW_SQL_MS.load(Ordering::Relaxed);
    let ms = duration.as_millis() as u64;
    if threshold == 0 || ms < threshold {
        return;
    }

    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %shorten_sql(sql, 400),
        "慢 SQL"
    );
    if guard_active() {
        SLOW_STATEMENTS.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 单次操作的统计结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfStats {
    pub elapsed_ms: u64,
    pub sql_count: u64,
    pub slow_sql_count: u64,
}

/// 操作耗时 + SQL 语句数统计；drop 时输出一条 perf 日志
///
/// ```ignore
/// let _perf = material_issue_window::perf::PerfGuard::new("save_draft");
/// ```
pub struct PerfGuard {
    op: &'static str,
    started: Instant,
    statements_at_start: u64,
    slow_at_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        ACTIVE_GUARDS.with(|g| g.set(g.get().saturating_add(1)));
        Self {
            op,
            started: Instant::now(),
            statements_at_start: STATEMENTS.with(|c| c.get()),
            slow_at_start: SLOW_STATEMENTS.with(|c| c.get()),
        }
    }

    /// 截至目前的统计
    pub fn stats(&self) -> PerfStats {
        PerfStats {
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            sql_count: STATEMENTS
                .with(|c| c.get())
                .saturating_sub(self.statements_at_start),
            slow_sql_count: SLOW_STATEMENTS
                .with(|c| c.get())
                .saturating_sub(self.slow_at_start),
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let stats = self.stats();
        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms = stats.elapsed_ms,
            sql_count = stats.sql_count,
            slow_sql_count = stats.slow_sql_count,
            "done"
        );
        ACTIVE_GUARDS.with(|g| g.set(g.get().saturating_sub(1)));
    }
}
