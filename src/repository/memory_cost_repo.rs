// ==========================================
// DPR 价格分析核心 - 内存成本数据仓储
// ==========================================
// 用途: 单元测试 / 集成测试 / 离线分析工具
// 语义: 与 SqliteCostRepository 保持一致 (upsert 键、区间校验、大小写不敏感匹配)
// ==========================================

use crate::domain::{
    CostCategory, HistoricalCostItem, InflationFactor, NormalizedCost, PriceBenchmark,
    RegionalCostFactor,
};
use crate::repository::cost_data_repo::CostDataRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryStore {
    regional_factors: Vec<RegionalCostFactor>,
    inflation_factors: Vec<InflationFactor>,
    historical_items: Vec<HistoricalCostItem>,
    benchmarks: Vec<PriceBenchmark>,
}

// ==========================================
// InMemoryCostRepository - 内存成本数据仓储
// ==========================================
#[derive(Debug, Default)]
pub struct InMemoryCostRepository {
    store: Mutex<MemoryStore>,
}

impl InMemoryCostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, MemoryStore>> {
        self.store
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 当前基准记录数 (测试断言用)
    pub fn benchmark_count(&self) -> RepositoryResult<usize> {
        Ok(self.lock()?.benchmarks.len())
    }

    /// 按 id 读取历史明细
    pub fn find_historical_item(&self, item_id: &str) -> RepositoryResult<Option<HistoricalCostItem>> {
        Ok(self
            .lock()?
            .historical_items
            .iter()
            .find(|item| item.id == item_id)
            .cloned())
    }
}

fn district_matches(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    }
}

impl CostDataRepository for InMemoryCostRepository {
    fn get_regional_cost_factor(
        &self,
        state: &str,
        category: CostCategory,
        as_of: NaiveDate,
        district: Option<&str>,
    ) -> RepositoryResult<Option<RegionalCostFactor>> {
        let store = self.lock()?;
        Ok(store
            .regional_factors
            .iter()
            .filter(|f| {
                f.state.eq_ignore_ascii_case(state)
                    && f.category == category
                    && district_matches(f.district.as_deref(), district)
                    && f.is_effective_on(as_of)
            })
            .max_by_key(|f| f.effective_from)
            .cloned())
    }

    fn get_inflation_factor(
        &self,
        year: i32,
        category: CostCategory,
        base_year: i32,
    ) -> RepositoryResult<Option<InflationFactor>> {
        let store = self.lock()?;
        Ok(store
            .inflation_factors
            .iter()
            .find(|f| f.year == year && f.category == category && f.base_year == base_year)
            .cloned())
    }

    fn upsert_regional_cost_factor(&self, factor: &RegionalCostFactor) -> RepositoryResult<()> {
        factor
            .validate()
            .map_err(RepositoryError::ValidationError)?;

        let mut store = self.lock()?;
        if let Some(other) = store.regional_factors.iter().find(|other| {
            other.same_scope(factor)
                && other.effective_from != factor.effective_from
                && other.overlaps(factor)
        }) {
            return Err(RepositoryError::OverlappingEffectiveRange {
                scope: format!(
                    "{}/{}/{}",
                    factor.state,
                    factor.district.as_deref().unwrap_or("-"),
                    factor.category
                ),
                existing_from: other.effective_from.to_string(),
                new_from: factor.effective_from.to_string(),
            });
        }

        store
            .regional_factors
            .retain(|other| !(other.same_scope(factor) && other.effective_from == factor.effective_from));
        store.regional_factors.push(factor.clone());
        Ok(())
    }

    fn upsert_inflation_factor(&self, factor: &InflationFactor) -> RepositoryResult<()> {
        factor
            .validate()
            .map_err(RepositoryError::ValidationError)?;

        let mut store = self.lock()?;
        match store.inflation_factors.iter_mut().find(|f| {
            f.year == factor.year && f.category == factor.category && f.base_year == factor.base_year
        }) {
            Some(existing) => *existing = factor.clone(),
            None => store.inflation_factors.push(factor.clone()),
        }
        Ok(())
    }

    fn get_historical_cost_items_by_category(
        &self,
        category: CostCategory,
        state: Option<&str>,
    ) -> RepositoryResult<Vec<HistoricalCostItem>> {
        let store = self.lock()?;
        Ok(store
            .historical_items
            .iter()
            .filter(|item| item.category == category)
            .filter(|item| state.map_or(true, |s| item.state.eq_ignore_ascii_case(s)))
            .cloned()
            .collect())
    }

    fn insert_historical_cost_item(&self, item: &HistoricalCostItem) -> RepositoryResult<()> {
        let mut store = self.lock()?;
        if store.historical_items.iter().any(|existing| existing.id == item.id) {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "historical_cost_item.id={}",
                item.id
            )));
        }
        store.historical_items.push(item.clone());
        Ok(())
    }

    fn update_normalized_values(
        &self,
        item_id: &str,
        normalized: &NormalizedCost,
    ) -> RepositoryResult<()> {
        let mut store = self.lock()?;
        let item = store
            .historical_items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "HistoricalCostItem".to_string(),
                id: item_id.to_string(),
            })?;
        item.apply_normalization(normalized);
        Ok(())
    }

    fn get_price_benchmark(
        &self,
        category: CostCategory,
        description: &str,
        region: &str,
        unit: Option<&str>,
    ) -> RepositoryResult<Option<PriceBenchmark>> {
        let store = self.lock()?;
        Ok(store
            .benchmarks
            .iter()
            .find(|b| {
                b.item_category == category
                    && b.item_description == description
                    && b.region.eq_ignore_ascii_case(region)
            })
            .filter(|b| b.accepts_unit(unit))
            .cloned())
    }

    fn create_or_update_price_benchmark(
        &self,
        benchmark: &PriceBenchmark,
    ) -> RepositoryResult<PriceBenchmark> {
        let mut store = self.lock()?;
        let key = benchmark.key();
        match store.benchmarks.iter_mut().find(|b| b.key().matches(&key)) {
            Some(existing) => {
                let id = existing.id.clone();
                let region = existing.region.clone();
                *existing = PriceBenchmark {
                    id,
                    region,
                    ..benchmark.clone()
                };
                Ok(existing.clone())
            }
            None => {
                store.benchmarks.push(benchmark.clone());
                Ok(benchmark.clone())
            }
        }
    }

    fn list_price_benchmarks(
        &self,
        category: Option<CostCategory>,
        region: Option<&str>,
    ) -> RepositoryResult<Vec<PriceBenchmark>> {
        let store = self.lock()?;
        let mut benchmarks: Vec<PriceBenchmark> = store
            .benchmarks
            .iter()
            .filter(|b| category.map_or(true, |c| b.item_category == c))
            .filter(|b| region.map_or(true, |r| b.region.eq_ignore_ascii_case(r)))
            .cloned()
            .collect();
        benchmarks.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(benchmarks)
    }
}
