// ==========================================
// DPR 价格分析核心 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供报表/界面层调用
// ==========================================

pub mod error;
pub mod price_analysis_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use price_analysis_api::{
    BenchmarkRunRequest, BenchmarkRunSummary, CategoryRegionOutcome, ComparisonRequest,
    PriceAnalysisApi, TaskFailure,
};
