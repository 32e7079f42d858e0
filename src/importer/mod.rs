// ==========================================
// DPR 价格分析核心 - 导入层
// ==========================================
// 职责: 外部历史成本数据导入
// 支持: CSV
// ==========================================

pub mod error;
pub mod historical_csv;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use historical_csv::{
    parse_historical_csv, HistoricalCsvImporter, ImportReport, ParsedRows, RowError,
};
