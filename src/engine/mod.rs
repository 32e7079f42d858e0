// ==========================================
// DPR 价格分析核心 - 引擎层
// ==========================================
// 职责: 归一化 / 分组 / 基准统计 / 价格比对, 不拼 SQL
// 红线: 引擎不读全局配置, 参数通过显式 options 传入
// 红线: 批处理单项失败隔离, 返回部分结果 + 失败清单
// ==========================================

pub mod benchmark_calculator;
pub mod cost_normalizer;
pub mod error;
pub mod item_grouper;
pub mod price_comparator;
pub mod reference_data;
pub mod scheme_eligibility;
pub mod statistics;

// 重导出核心引擎
pub use benchmark_calculator::{
    BenchmarkBatchResult, BenchmarkCalculator, BenchmarkOptions, CalculatedBenchmark,
    MacroRegion, SkippedGroup,
};
pub use cost_normalizer::{
    BenchmarkProjection, CostNormalizer, InflationDefaults, NormalizationBatch,
    NormalizationTarget,
};
pub use error::{CostError, CostResult};
pub use item_grouper::{DescriptionGroup, ItemGrouper};
pub use price_comparator::{ComparisonOptions, PriceComparator};
pub use reference_data::seed_inflation_factors;
pub use scheme_eligibility::{SchemeCriteria, SchemeEligibilityScorer};
