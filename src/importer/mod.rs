// ==========================================
// 棒料发料窗口 - 导入层
// ==========================================
// 职责: 到货清单导入（棒料件的唯一创建来源）
// 支持: CSV
// ==========================================

pub mod error;
pub mod receipt_importer;
pub mod receipt_parser;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use receipt_importer::{PieceReceiptImporter, ReceiptImportSummary};
pub use receipt_parser::ReceiptCsvParser;
