// ==========================================
// DPR 价格分析核心 - 导入模块错误类型
// ==========================================
// 分类: 文件级错误 (终止导入) / 行级错误 (记录后继续)
// ==========================================

use crate::repository::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0} (仅支持 .csv)")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("CSV 表头缺少必需列: {0}")]
    MissingColumn(String),

    // ===== 行级错误 =====
    #[error("必填字段缺失 (行 {row}, 字段 {field})")]
    MissingField { row: usize, field: String },

    #[error("类型转换失败 (行 {row}, 字段 {field}): {message}")]
    TypeConversionError {
        row: usize,
        field: String,
        message: String,
    },

    #[error("数值范围错误 (行 {row}, 字段 {field}): 值 {value} 必须为正数")]
    NonPositiveValue { row: usize, field: String, value: f64 },

    // ===== 数据库错误 =====
    #[error("写入失败 (行 {row}): {source}")]
    Persist {
        row: usize,
        #[source]
        source: RepositoryError,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl ImportError {
    /// 行号 (文件级错误返回 None)
    pub fn row(&self) -> Option<usize> {
        match self {
            ImportError::MissingField { row, .. }
            | ImportError::TypeConversionError { row, .. }
            | ImportError::NonPositiveValue { row, .. }
            | ImportError::Persist { row, .. } => Some(*row),
            _ => None,
        }
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
