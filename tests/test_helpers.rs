// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use material_issue_window::domain::issue_window::{BarAssignmentInput, CutInput};
use material_issue_window::domain::material::MaterialSnapshot;
use material_issue_window::domain::piece::PieceReceipt;
use material_issue_window::repository::MaterialMasterRepository;
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = material_issue_window::db::open_sqlite_connection(&db_path)?;
    material_issue_window::db::ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开一个新的共享连接（每个调用方一个独立连接）
pub fn open_shared(db_path: &str) -> Arc<Mutex<Connection>> {
    let conn = material_issue_window::db::open_sqlite_connection(db_path).unwrap();
    Arc::new(Mutex::new(conn))
}

/// 写入一条材料主数据
pub fn seed_material(
    conn: Arc<Mutex<Connection>>,
    material_id: i64,
    code: &str,
    min_usable_length: Option<i64>,
) {
    MaterialMasterRepository::new(conn)
        .upsert(&MaterialSnapshot {
            material_id,
            material_code: code.to_string(),
            material_name: format!("{} Round", code),
            grade: Some(code.split('-').next().unwrap_or(code).to_string()),
            diameter: Some(40.0),
            min_usable_length,
        })
        .unwrap();
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 到货入库输入
pub fn receipt(piece_no: &str, material_id: i64, length: i64, receipt_date: NaiveDate) -> PieceReceipt {
    PieceReceipt {
        piece_no: piece_no.to_string(),
        material_id,
        length,
        weight: length as f64 * 0.01,
        receipt_date,
        grn_no: Some("GRN-001".to_string()),
        supplier_name: Some("Test Steel".to_string()),
        batch_no: None,
        unit_cost: None,
        location_code: Some("A1".to_string()),
        rack_no: None,
    }
}

/// 一刀
pub fn cut(requisition_item_id: i64, requisition_id: i64, cut_length: i64) -> CutInput {
    CutInput {
        requisition_item_id,
        requisition_id,
        cut_length,
        part_name: Some(format!("PART-{}", requisition_item_id)),
        job_card_no: Some(format!("JC-{}", requisition_id)),
        requisition_no: Some(format!("REQ-{}", requisition_id)),
    }
}

/// 一根棒料的切割方案（切割顺序即参数顺序）
pub fn bar(
    material_id: i64,
    piece_id: i64,
    piece_no: &str,
    piece_current_length: i64,
    cuts: Vec<CutInput>,
) -> BarAssignmentInput {
    BarAssignmentInput {
        material_id,
        piece_id,
        piece_no: piece_no.to_string(),
        piece_current_length,
        cuts,
    }
}
