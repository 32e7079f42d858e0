// ==========================================
// DPR 价格分析核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod cost_data_repo;
pub mod error;
pub mod memory_cost_repo;
pub mod sqlite_cost_repo;

// 重导出核心仓储
pub use cost_data_repo::CostDataRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use memory_cost_repo::InMemoryCostRepository;
pub use sqlite_cost_repo::SqliteCostRepository;
