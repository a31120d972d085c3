// ==========================================
// 棒料发料窗口 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键/busy_timeout）
// - 统一建表入口，测试与生产共用同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（草案删除依赖级联）
/// - busy_timeout 需要“每个连接”单独配置（并发发料/草案写入）
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等建表
///
/// 包含: 配置表、材料主数据、棒料件、发料窗口草案（表头/棒料分配/切割明细/编号水位）、操作日志
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
          version INTEGER PRIMARY KEY,
          applied_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
          scope_id TEXT PRIMARY KEY,
          scope_type TEXT NOT NULL,
          scope_key TEXT NOT NULL,
          created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
          UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
          scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
          key TEXT NOT NULL,
          value TEXT NOT NULL,
          updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
          PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS material_master (
          material_id INTEGER PRIMARY KEY,
          material_code TEXT NOT NULL,
          material_name TEXT NOT NULL,
          grade TEXT,
          diameter REAL,
          min_usable_length INTEGER,
          created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );

        CREATE TABLE IF NOT EXISTS material_piece (
          piece_id INTEGER PRIMARY KEY AUTOINCREMENT,
          piece_no TEXT NOT NULL UNIQUE,
          material_id INTEGER NOT NULL,

          original_length INTEGER NOT NULL CHECK(original_length >= 0),
          original_weight REAL NOT NULL CHECK(original_weight >= 0),
          current_length INTEGER NOT NULL,
          current_weight REAL NOT NULL,

          status TEXT NOT NULL DEFAULT 'AVAILABLE'
            CHECK(status IN ('AVAILABLE', 'RESERVED', 'ALLOCATED', 'ISSUED', 'CONSUMED')),

          location_code TEXT,
          rack_no TEXT,

          grn_no TEXT,
          supplier_name TEXT,
          batch_no TEXT,
          unit_cost REAL,
          receipt_date TEXT NOT NULL,

          reserved_by_draft_id INTEGER,
          reserved_at TEXT,
          allocated_requisition_id INTEGER,
          allocated_at TEXT,
          issued_job_card_id INTEGER,
          issued_date TEXT,
          issued_by TEXT,
          consumed_at TEXT,

          created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
          updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),

          CHECK(current_length >= 0 AND current_length <= original_length),
          CHECK(current_weight >= 0 AND current_weight <= original_weight)
        );

        CREATE INDEX IF NOT EXISTS idx_material_piece_fifo
          ON material_piece(material_id, status, receipt_date, current_length);
        CREATE INDEX IF NOT EXISTS idx_material_piece_reserved_draft
          ON material_piece(reserved_by_draft_id);

        CREATE TABLE IF NOT EXISTS issue_window_draft (
          draft_id INTEGER PRIMARY KEY AUTOINCREMENT,
          draft_number TEXT NOT NULL UNIQUE,
          status TEXT NOT NULL CHECK(status IN ('DRAFT', 'FINALIZED', 'ISSUED')),
          requisition_ids_json TEXT NOT NULL DEFAULT '[]',
          notes TEXT,
          created_by TEXT,
          issued_by TEXT,
          received_by TEXT,
          created_at TEXT NOT NULL,
          finalized_at TEXT,
          issued_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_issue_window_draft_status
          ON issue_window_draft(status, created_at DESC);

        CREATE TABLE IF NOT EXISTS issue_window_bar_assignment (
          bar_id INTEGER PRIMARY KEY AUTOINCREMENT,
          draft_id INTEGER NOT NULL REFERENCES issue_window_draft(draft_id) ON DELETE CASCADE,
          material_id INTEGER NOT NULL,
          material_code TEXT NOT NULL DEFAULT '',
          material_name TEXT NOT NULL DEFAULT '',
          grade TEXT,
          diameter REAL,
          piece_id INTEGER NOT NULL,
          piece_no TEXT NOT NULL,
          piece_current_length INTEGER NOT NULL,
          total_cut_length INTEGER NOT NULL,
          remaining_length INTEGER NOT NULL,
          will_be_scrap INTEGER NOT NULL DEFAULT 0,
          min_usable_length INTEGER NOT NULL,
          sort_order INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_issue_window_bar_draft
          ON issue_window_bar_assignment(draft_id, sort_order);

        CREATE TABLE IF NOT EXISTS issue_window_cut (
          cut_id INTEGER PRIMARY KEY AUTOINCREMENT,
          bar_id INTEGER NOT NULL REFERENCES issue_window_bar_assignment(bar_id) ON DELETE CASCADE,
          draft_id INTEGER NOT NULL REFERENCES issue_window_draft(draft_id) ON DELETE CASCADE,
          requisition_item_id INTEGER NOT NULL,
          requisition_id INTEGER NOT NULL,
          cut_index INTEGER NOT NULL,
          cut_length INTEGER NOT NULL CHECK(cut_length > 0),
          part_name TEXT,
          job_card_no TEXT,
          requisition_no TEXT,
          sort_order INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_issue_window_cut_bar
          ON issue_window_cut(bar_id, sort_order);
        CREATE INDEX IF NOT EXISTS idx_issue_window_cut_draft
          ON issue_window_cut(draft_id);

        CREATE TABLE IF NOT EXISTS issue_window_number_seq (
          period TEXT PRIMARY KEY,
          last_seq INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS action_log (
          action_id TEXT PRIMARY KEY,
          entity_type TEXT NOT NULL,
          entity_id TEXT NOT NULL,
          action_type TEXT NOT NULL,
          actor TEXT NOT NULL,
          action_ts TEXT NOT NULL,
          payload_json TEXT,
          detail TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_action_log_entity
          ON action_log(entity_type, entity_id, action_ts);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
