// ==========================================
// 棒料发料窗口 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("缺少必需列: {0}")]
    MissingColumn(String),

    // ===== 数据质量错误 =====
    #[error("第{line}行: {message}")]
    Row { line: u64, message: String },

    #[error("{} 行数据无效，整批未导入", .0.len())]
    InvalidRows(Vec<ImportError>),

    #[error("文件没有任何数据行")]
    EmptyFile,

    // ===== 落库错误 =====
    #[error("入库失败: {0}")]
    PersistError(String),
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<crate::api::ApiError> for ImportError {
    fn from(err: crate::api::ApiError) -> Self {
        ImportError::PersistError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
