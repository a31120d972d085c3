// ==========================================
// 棒料发料窗口 - 到货入库导入器
// ==========================================
// 流程: 解析 CSV → 逐行校验 → 单事务批量登记 → 审计
// 红线: 任一行无效则整批不入库
// ==========================================

use crate::api::piece_api::PieceApi;
use crate::importer::error::ImportResult;
use crate::importer::receipt_parser::ReceiptCsvParser;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// 导入结果摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptImportSummary {
    pub batch_id: String,
    pub file_name: String,
    pub imported: usize,
    pub piece_ids: Vec<i64>,
    pub elapsed_ms: u64,
}

pub struct PieceReceiptImporter {
    piece_api: Arc<PieceApi>,
}

impl PieceReceiptImporter {
    pub fn new(piece_api: Arc<PieceApi>) -> Self {
        Self { piece_api }
    }

    /// 导入到货清单文件
    pub fn import_file(&self, path: &Path, operator: &str) -> ImportResult<ReceiptImportSummary> {
        let started = Instant::now();
        let batch_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(batch_id = %batch_id, path = %path.display(), "开始导入到货清单");

        let receipts = match ReceiptCsvParser::parse_path(path) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(batch_id = %batch_id, error = %e, "到货清单解析失败");
                return Err(e);
            }
        };

        let piece_ids = self.piece_api.receive_pieces(&receipts, operator)?;

        let summary = ReceiptImportSummary {
            batch_id,
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            imported: piece_ids.len(),
            piece_ids,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            batch_id = %summary.batch_id,
            imported = summary.imported,
            elapsed_ms = summary.elapsed_ms,
            "到货清单导入完成"
        );
        Ok(summary)
    }
}
