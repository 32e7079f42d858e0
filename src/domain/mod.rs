// ==========================================
// DPR 价格分析核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod benchmark;
pub mod comparison;
pub mod cost_item;
pub mod factor;
pub mod types;

// 重导出核心类型
pub use benchmark::{
    units_compatible, BenchmarkKey, BenchmarkStatistics, ConfidenceInterval, PriceBenchmark,
};
pub use comparison::{
    ItemComparison, PriceComparisonResult, PriceFlaggedItem, SchemeEligibility, SkippedItem,
};
pub use cost_item::{
    DprCostItem, HistoricalCostItem, ItemFailure, NormalizationBreakdown, NormalizedCost,
};
pub use factor::{InflationFactor, RegionalCostFactor};
pub use types::{
    CostCategory, FactorSource, FlagType, FundingAlignment, InflationSource, PriceClassification,
};
