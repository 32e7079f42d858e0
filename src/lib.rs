// ==========================================
// DPR 价格分析核心 - 核心库
// ==========================================
// 职责: 历史成本归一化 / 价格基准统计 / DPR 价格异常识别
// 技术栈: Rust + SQLite
// 系统定位: 决策支持 (结果供评审人员参考, 不自动否决)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 计算规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 分析配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CostCategory, FactorSource, FlagType, FundingAlignment, InflationSource, PriceClassification,
};

// 领域实体
pub use domain::{
    DprCostItem, HistoricalCostItem, InflationFactor, NormalizedCost, PriceBenchmark,
    PriceComparisonResult, PriceFlaggedItem, RegionalCostFactor, SchemeEligibility,
};

// 仓储
pub use repository::{CostDataRepository, InMemoryCostRepository, SqliteCostRepository};

// 引擎
pub use engine::{
    BenchmarkCalculator, BenchmarkOptions, ComparisonOptions, CostNormalizer, ItemGrouper,
    MacroRegion, NormalizationTarget, PriceComparator,
};

// API
pub use api::{ApiError, ApiResult, PriceAnalysisApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "DPR 价格分析核心";
