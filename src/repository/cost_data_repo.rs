// ==========================================
// DPR 价格分析核心 - 成本数据仓储接口
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 系数读取 / 历史明细读取 / 价格基准读写
// 实现者: SqliteCostRepository, InMemoryCostRepository
// ==========================================

use crate::domain::{
    CostCategory, HistoricalCostItem, InflationFactor, NormalizedCost, PriceBenchmark,
    RegionalCostFactor,
};
use crate::repository::error::RepositoryResult;
use chrono::NaiveDate;

// ==========================================
// CostDataRepository Trait
// ==========================================
// 通过构造函数注入引擎, 测试可替换为内存实现
pub trait CostDataRepository: Send + Sync {
    // ===== 参考系数 =====

    /// 查询在 as_of 当日生效的地区系数
    ///
    /// # 参数
    /// - district: Some 时只匹配该区县的记录; None 时只匹配邦级记录 (district 为空)
    ///
    /// # 返回
    /// - Ok(None): 无覆盖该日期的记录
    fn get_regional_cost_factor(
        &self,
        state: &str,
        category: CostCategory,
        as_of: NaiveDate,
        district: Option<&str>,
    ) -> RepositoryResult<Option<RegionalCostFactor>>;

    /// 按 (year, category, base_year) 精确查询通胀系数
    fn get_inflation_factor(
        &self,
        year: i32,
        category: CostCategory,
        base_year: i32,
    ) -> RepositoryResult<Option<InflationFactor>>;

    /// 写入地区系数 (同作用域同 effective_from 覆盖; 与其他记录区间重叠则拒绝)
    fn upsert_regional_cost_factor(&self, factor: &RegionalCostFactor) -> RepositoryResult<()>;

    /// 写入通胀系数 (按 (year, category, base_year) 覆盖)
    fn upsert_inflation_factor(&self, factor: &InflationFactor) -> RepositoryResult<()>;

    // ===== 历史成本明细 =====

    /// 按类别 (可选邦) 查询历史明细, 按写入顺序返回
    fn get_historical_cost_items_by_category(
        &self,
        category: CostCategory,
        state: Option<&str>,
    ) -> RepositoryResult<Vec<HistoricalCostItem>>;

    fn insert_historical_cost_item(&self, item: &HistoricalCostItem) -> RepositoryResult<()>;

    /// 写回归一化结果 (显式重新归一化)
    fn update_normalized_values(
        &self,
        item_id: &str,
        normalized: &NormalizedCost,
    ) -> RepositoryResult<()>;

    // ===== 价格基准 =====

    /// 按 (category, description, region) 查询价格基准
    ///
    /// unit 为 Some 时要求单位兼容 (见 `units_compatible`)
    fn get_price_benchmark(
        &self,
        category: CostCategory,
        description: &str,
        region: &str,
        unit: Option<&str>,
    ) -> RepositoryResult<Option<PriceBenchmark>>;

    /// 按 (category, description, region) 插入或更新价格基准
    ///
    /// # 返回
    /// 持久化后的记录 (已存在时保留原 id)
    fn create_or_update_price_benchmark(
        &self,
        benchmark: &PriceBenchmark,
    ) -> RepositoryResult<PriceBenchmark>;

    fn list_price_benchmarks(
        &self,
        category: Option<CostCategory>,
        region: Option<&str>,
    ) -> RepositoryResult<Vec<PriceBenchmark>>;
}
