// ==========================================
// 棒料发料窗口 - 棒料件领域模型
// ==========================================
// 一根物理棒料/圆钢：按长度 + 重量逐件追踪
// 对齐: material_piece 表
// ==========================================

use crate::domain::types::PieceStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// MaterialPiece - 棒料件
// ==========================================
// 不变量: 0 <= current_length <= original_length
//         0 <= current_weight <= original_weight
// 用途: 到货入库创建，分配/发放/消耗/退回修改，仅管理员清理时物理删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialPiece {
    // ===== 主键 =====
    pub piece_id: i64,
    pub piece_no: String, // 件号（人工可读）

    // ===== 材料 =====
    pub material_id: i64,

    // ===== 长度/重量 =====
    pub original_length: i64, // 入库长度（mm，不可变）
    pub original_weight: f64, // 入库重量（kg，不可变）
    pub current_length: i64,  // 当前长度（mm，单调不增）
    pub current_weight: f64,  // 当前重量（kg，单调不增）

    // ===== 状态 =====
    pub status: PieceStatus,
    pub reserved_by_draft_id: Option<i64>,
    pub allocated_requisition_id: Option<i64>,
    pub issued_job_card_id: Option<i64>,
    pub issued_date: Option<NaiveDate>,
    pub issued_by: Option<String>,

    // ===== 库位 =====
    pub location_code: Option<String>,
    pub rack_no: Option<String>,

    // ===== 到货信息 =====
    pub grn_no: Option<String>,
    pub supplier_name: Option<String>,
    pub batch_no: Option<String>,
    pub unit_cost: Option<f64>,
    pub receipt_date: NaiveDate, // FIFO 排序依据

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl MaterialPiece {
    /// 已消耗长度
    pub fn consumed_length(&self) -> i64 {
        self.original_length - self.current_length
    }

    /// 是否满足一刀所需长度
    pub fn covers(&self, required_length: i64) -> bool {
        self.current_length >= required_length
    }
}

// ==========================================
// PieceReceipt - 到货入库输入
// ==========================================
// 到货入库（外部）是棒料件的唯一创建者；入库时 current = original
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PieceReceipt {
    pub piece_no: String,
    pub material_id: i64,
    pub length: i64,
    pub weight: f64,
    pub receipt_date: NaiveDate,
    pub grn_no: Option<String>,
    pub supplier_name: Option<String>,
    pub batch_no: Option<String>,
    pub unit_cost: Option<f64>,
    pub location_code: Option<String>,
    pub rack_no: Option<String>,
}
