// ==========================================
// DPR 价格分析核心 - 成本归一化引擎
// ==========================================
// 职责: 将历史/基准单价换算到目标年份与目标地区
// 公式: normalized = unit_rate * regional_factor * inflation_factor
// 红线: 参考数据缺失不得失败, 降级为中性系数并标记来源
// 红线: 不写系数表 (纯计算 + 只读仓储)
// ==========================================

use crate::domain::{
    CostCategory, FactorSource, HistoricalCostItem, InflationSource, ItemFailure,
    NormalizationBreakdown, NormalizedCost, PriceBenchmark,
};
use crate::engine::error::{CostError, CostResult};
use crate::repository::CostDataRepository;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// 通胀系数基准年
pub const DEFAULT_BASE_YEAR: i32 = 2020;

/// 未配置类别的默认年增长率
pub const DEFAULT_ANNUAL_INFLATION_RATE: f64 = 0.06;

// ==========================================
// InflationDefaults - 通胀估算默认参数
// ==========================================
/// 精确通胀记录缺失时的估算参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InflationDefaults {
    pub base_year: i32,
    pub annual_rates: HashMap<CostCategory, f64>,
    pub fallback_rate: f64,
}

impl Default for InflationDefaults {
    fn default() -> Self {
        let annual_rates = HashMap::from([
            (CostCategory::Construction, 0.06),
            (CostCategory::Labor, 0.08),
            (CostCategory::Materials, 0.07),
            (CostCategory::Equipment, 0.05),
            (CostCategory::Transport, 0.06),
        ]);
        Self {
            base_year: DEFAULT_BASE_YEAR,
            annual_rates,
            fallback_rate: DEFAULT_ANNUAL_INFLATION_RATE,
        }
    }
}

impl InflationDefaults {
    /// 类别年增长率 (未配置时使用 fallback_rate)
    pub fn rate_for(&self, category: CostCategory) -> f64 {
        self.annual_rates
            .get(&category)
            .copied()
            .unwrap_or(self.fallback_rate)
    }

    /// 估算累计系数 (1 + rate)^(year - base_year)
    pub fn approximate_cumulative(&self, category: CostCategory, year: i32) -> f64 {
        (1.0 + self.rate_for(category)).powi(year - self.base_year)
    }
}

// ==========================================
// NormalizationTarget - 归一化目标
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationTarget {
    pub target_year: i32,
    pub state: String,
    pub district: Option<String>,
    /// 地区系数的生效判定日期
    pub as_of: NaiveDate,
}

impl NormalizationTarget {
    /// 以今天为生效判定日期
    pub fn new(target_year: i32, state: &str) -> Self {
        Self {
            target_year,
            state: state.to_string(),
            district: None,
            as_of: Utc::now().date_naive(),
        }
    }

    pub fn with_district(mut self, district: Option<&str>) -> Self {
        self.district = district.map(|d| d.to_string());
        self
    }

    pub fn as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = as_of;
        self
    }
}

/// 解析得到的地区系数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedFactor {
    pub value: f64,
    pub source: FactorSource,
}

/// 解析得到的通胀系数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedInflation {
    pub value: f64,
    pub source: InflationSource,
}

/// 批量归一化结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationBatch {
    pub successes: Vec<NormalizedCost>,
    pub failures: Vec<ItemFailure>,
}

/// 基准单价投影结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkProjection {
    pub normalized_unit_rate: f64,
    /// regional_factor * inflation_factor
    pub scale: f64,
    pub regional_factor: f64,
    pub inflation_factor: f64,
    pub regional_source: FactorSource,
    pub inflation_source: InflationSource,
}

// ==========================================
// CostNormalizer - 成本归一化引擎
// ==========================================
pub struct CostNormalizer<R>
where
    R: CostDataRepository + ?Sized,
{
    repo: Arc<R>,
    defaults: InflationDefaults,
}

impl<R> CostNormalizer<R>
where
    R: CostDataRepository + ?Sized,
{
    /// 创建新的 CostNormalizer 实例 (默认通胀参数)
    pub fn new(repo: Arc<R>) -> Self {
        Self::with_defaults(repo, InflationDefaults::default())
    }

    pub fn with_defaults(repo: Arc<R>, defaults: InflationDefaults) -> Self {
        Self { repo, defaults }
    }

    pub fn defaults(&self) -> &InflationDefaults {
        &self.defaults
    }

    // ==========================================
    // 系数解析
    // ==========================================

    /// 解析地区系数: 区县级 -> 邦级 -> 1.0
    ///
    /// 仓储读取失败与无记录同等处理 (继续降级)
    pub fn resolve_regional_factor(
        &self,
        category: CostCategory,
        state: &str,
        district: Option<&str>,
        as_of: NaiveDate,
    ) -> ResolvedFactor {
        if let Some(district) = district {
            match self
                .repo
                .get_regional_cost_factor(state, category, as_of, Some(district))
            {
                Ok(Some(f)) => {
                    return ResolvedFactor {
                        value: f.factor,
                        source: FactorSource::District,
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(state, district, %category, error = %e, "区县级地区系数读取失败"),
            }
        }

        match self.repo.get_regional_cost_factor(state, category, as_of, None) {
            Ok(Some(f)) => ResolvedFactor {
                value: f.factor,
                source: FactorSource::State,
            },
            Ok(None) => ResolvedFactor {
                value: 1.0,
                source: FactorSource::Default,
            },
            Err(e) => {
                warn!(state, %category, error = %e, "邦级地区系数读取失败");
                ResolvedFactor {
                    value: 1.0,
                    source: FactorSource::Default,
                }
            }
        }
    }

    /// 解析通胀累计系数: 精确记录 -> 按默认年增长率估算
    pub fn resolve_inflation_factor(&self, category: CostCategory, year: i32) -> ResolvedInflation {
        match self
            .repo
            .get_inflation_factor(year, category, self.defaults.base_year)
        {
            Ok(Some(f)) => {
                return ResolvedInflation {
                    value: f.cumulative_factor,
                    source: InflationSource::Exact,
                }
            }
            Ok(None) => {}
            Err(e) => warn!(year, %category, error = %e, "通胀系数读取失败"),
        }

        ResolvedInflation {
            value: self.defaults.approximate_cumulative(category, year),
            source: InflationSource::Approximated,
        }
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 归一化单条历史明细
    ///
    /// # 返回
    /// - Ok(NormalizedCost): 含系数来源明细
    /// - Err(CostError::MalformedInput): 单价/数量非正
    #[instrument(skip(self, item, target), fields(item_id = %item.id))]
    pub fn normalize(
        &self,
        item: &HistoricalCostItem,
        target: &NormalizationTarget,
    ) -> CostResult<NormalizedCost> {
        validate_item(item)?;

        let regional = self.resolve_regional_factor(
            item.category,
            &target.state,
            target.district.as_deref(),
            target.as_of,
        );
        let mut missing_references = Vec::new();
        if regional.source.is_fallback() {
            let missing = CostError::MissingReferenceData(format!(
                "地区系数 {}/{} @ {}",
                target.state, item.category, target.as_of
            ));
            warn!(reason = %missing, "使用中性系数 1.0");
            missing_references.push(missing.to_string());
        }

        let inflation = self.resolve_inflation_factor(item.category, target.target_year);
        if inflation.source.is_fallback() {
            let missing = CostError::MissingReferenceData(format!(
                "通胀系数 {}/{} (基准年 {})",
                target.target_year, item.category, self.defaults.base_year
            ));
            debug!(reason = %missing, factor = inflation.value, "使用默认年增长率估算");
            missing_references.push(missing.to_string());
        }

        let regional_adjusted_rate = item.unit_rate * regional.value;
        let normalized_unit_rate = regional_adjusted_rate * inflation.value;
        let normalized_total_cost = match item.quantity {
            Some(q) => normalized_unit_rate * q,
            None => normalized_unit_rate,
        };

        Ok(NormalizedCost {
            item_id: item.id.clone(),
            normalized_unit_rate,
            normalized_total_cost,
            regional_factor: regional.value,
            inflation_factor: inflation.value,
            breakdown: NormalizationBreakdown {
                original_unit_rate: item.unit_rate,
                regional_adjusted_rate,
                regional_source: regional.source,
                inflation_source: inflation.source,
                target_year: target.target_year,
                target_state: target.state.clone(),
                target_district: target.district.clone(),
                missing_references,
            },
        })
    }

    /// 批量归一化 (单项失败不影响其他项)
    ///
    /// 失败项以恒等系数 (1.0, 1.0) 生成兜底结果, 单独放入 failures
    pub fn normalize_batch(
        &self,
        items: &[HistoricalCostItem],
        target: &NormalizationTarget,
    ) -> NormalizationBatch {
        let mut batch = NormalizationBatch::default();

        for item in items {
            match self.normalize(item, target) {
                Ok(normalized) => batch.successes.push(normalized),
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "明细归一化失败, 已隔离");
                    batch.failures.push(ItemFailure {
                        item_id: item.id.clone(),
                        description: item.description.clone(),
                        error: e.to_string(),
                        fallback: Some(NormalizedCost::identity(
                            item,
                            target.target_year,
                            &target.state,
                        )),
                    });
                }
            }
        }

        batch
    }

    /// 归一化并写回历史明细 (显式重新归一化)
    pub fn normalize_and_store(
        &self,
        item: &HistoricalCostItem,
        target: &NormalizationTarget,
    ) -> CostResult<NormalizedCost> {
        let normalized = self.normalize(item, target)?;
        self.repo.update_normalized_values(&item.id, &normalized)?;
        Ok(normalized)
    }

    /// 将基准平均单价投影到目标年/目标地区
    ///
    /// 基准以 (base_year, region) 口径存储, 投影使用系数比值:
    /// regional(target) / regional(region), inflation(target_year) / inflation(base_year)
    pub fn project_benchmark(
        &self,
        benchmark: &PriceBenchmark,
        target: &NormalizationTarget,
    ) -> BenchmarkProjection {
        let category = benchmark.item_category;

        let target_regional = self.resolve_regional_factor(
            category,
            &target.state,
            target.district.as_deref(),
            target.as_of,
        );
        let source_regional =
            self.resolve_regional_factor(category, &benchmark.region, None, target.as_of);
        let regional_factor = ratio(target_regional.value, source_regional.value);

        let target_inflation = self.resolve_inflation_factor(category, target.target_year);
        let source_inflation = self.resolve_inflation_factor(category, benchmark.base_year);
        let inflation_factor = ratio(target_inflation.value, source_inflation.value);

        let inflation_source =
            if target_inflation.source.is_fallback() || source_inflation.source.is_fallback() {
                InflationSource::Approximated
            } else {
                InflationSource::Exact
            };

        let scale = regional_factor * inflation_factor;
        BenchmarkProjection {
            normalized_unit_rate: benchmark.average_unit_rate * scale,
            scale,
            regional_factor,
            inflation_factor,
            regional_source: target_regional.source,
            inflation_source,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 && denominator.is_finite() {
        numerator / denominator
    } else {
        numerator
    }
}

/// 单价/数量校验
fn validate_item(item: &HistoricalCostItem) -> CostResult<()> {
    if !item.unit_rate.is_finite() || item.unit_rate <= 0.0 {
        return Err(CostError::malformed(
            &item.id,
            "unit_rate",
            format!("单价必须为正数, 实际 {}", item.unit_rate),
        ));
    }
    if let Some(q) = item.quantity {
        if !q.is_finite() || q <= 0.0 {
            return Err(CostError::malformed(
                &item.id,
                "quantity",
                format!("数量必须为正数, 实际 {}", q),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InflationFactor, RegionalCostFactor};
    use crate::repository::InMemoryCostRepository;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn seeded_repo() -> Arc<InMemoryCostRepository> {
        let repo = InMemoryCostRepository::new();
        repo.upsert_regional_cost_factor(&RegionalCostFactor {
            state: "Assam".to_string(),
            district: None,
            category: CostCategory::Materials,
            factor: 1.15,
            base_year: 2020,
            effective_from: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            effective_to: None,
        })
        .unwrap();
        repo.upsert_regional_cost_factor(&RegionalCostFactor {
            state: "Assam".to_string(),
            district: Some("Kamrup".to_string()),
            category: CostCategory::Materials,
            factor: 1.25,
            base_year: 2020,
            effective_from: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            effective_to: None,
        })
        .unwrap();
        repo.upsert_inflation_factor(&InflationFactor {
            year: 2024,
            category: CostCategory::Materials,
            inflation_rate: 0.07,
            cumulative_factor: 1.065,
            base_year: 2020,
        })
        .unwrap();
        Arc::new(repo)
    }

    #[test]
    fn test_identity_factors_leave_rate_unchanged() {
        let repo = Arc::new(InMemoryCostRepository::new());
        repo.upsert_inflation_factor(&InflationFactor::base(CostCategory::Labor, 2020, 0.08))
            .unwrap();
        let normalizer = CostNormalizer::new(repo);

        let item = HistoricalCostItem::new("P1", CostCategory::Labor, "Mason", 850.0, "Goa");
        let target = NormalizationTarget::new(2020, "Goa").as_of(as_of());
        let n = normalizer.normalize(&item, &target).unwrap();

        assert_eq!(n.regional_factor, 1.0);
        assert_eq!(n.inflation_factor, 1.0);
        assert_eq!(n.normalized_unit_rate, 850.0);
        assert_eq!(n.breakdown.regional_source, FactorSource::Default);
        assert_eq!(n.breakdown.inflation_source, InflationSource::Exact);
    }

    #[test]
    fn test_district_factor_preferred_over_state() {
        let normalizer = CostNormalizer::new(seeded_repo());
        let item = HistoricalCostItem::new("P1", CostCategory::Materials, "Bitumen", 1000.0, "Assam");

        let district = NormalizationTarget::new(2024, "Assam")
            .with_district(Some("Kamrup"))
            .as_of(as_of());
        let n = normalizer.normalize(&item, &district).unwrap();
        assert_eq!(n.breakdown.regional_source, FactorSource::District);
        assert!((n.normalized_unit_rate - 1000.0 * 1.25 * 1.065).abs() < 1e-6);

        let unknown_district = NormalizationTarget::new(2024, "Assam")
            .with_district(Some("Cachar"))
            .as_of(as_of());
        let n = normalizer.normalize(&item, &unknown_district).unwrap();
        assert_eq!(n.breakdown.regional_source, FactorSource::State);
        assert!((n.normalized_unit_rate - 1000.0 * 1.15 * 1.065).abs() < 1e-6);
    }

    #[test]
    fn test_inflation_approximation_is_flagged() {
        let normalizer = CostNormalizer::new(seeded_repo());
        let item = HistoricalCostItem::new("P1", CostCategory::Labor, "Helper", 500.0, "Assam");
        let target = NormalizationTarget::new(2023, "Assam").as_of(as_of());
        let n = normalizer.normalize(&item, &target).unwrap();

        assert_eq!(n.breakdown.inflation_source, InflationSource::Approximated);
        assert!((n.inflation_factor - 1.08f64.powi(3)).abs() < 1e-9);
        assert!(n.used_fallback());
    }

    #[test]
    fn test_total_cost_uses_quantity() {
        let normalizer = CostNormalizer::new(seeded_repo());
        let item = HistoricalCostItem::new("P1", CostCategory::Materials, "Bitumen", 1000.0, "Assam")
            .with_quantity(3.0);
        let target = NormalizationTarget::new(2024, "Assam").as_of(as_of());
        let n = normalizer.normalize(&item, &target).unwrap();
        assert!((n.normalized_total_cost - n.normalized_unit_rate * 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_item_rejected() {
        let normalizer = CostNormalizer::new(seeded_repo());
        let item = HistoricalCostItem::new("P1", CostCategory::Materials, "Bitumen", 0.0, "Assam");
        let target = NormalizationTarget::new(2024, "Assam").as_of(as_of());
        let err = normalizer.normalize(&item, &target).unwrap_err();
        assert!(matches!(err, CostError::MalformedInput { .. }));
    }

    #[test]
    fn test_unknown_category_rate_uses_fallback() {
        let mut defaults = InflationDefaults::default();
        defaults.annual_rates.remove(&CostCategory::Transport);
        assert_eq!(defaults.rate_for(CostCategory::Transport), DEFAULT_ANNUAL_INFLATION_RATE);
        assert_eq!(defaults.approximate_cumulative(CostCategory::Transport, 2020), 1.0);
    }

    #[test]
    fn test_projection_of_same_basis_is_identity() {
        let normalizer = CostNormalizer::new(seeded_repo());
        let benchmark = PriceBenchmark {
            id: "B1".to_string(),
            item_category: CostCategory::Materials,
            item_description: "bitumen".to_string(),
            unit: None,
            region: "Assam".to_string(),
            average_unit_rate: 57000.0,
            median_unit_rate: 56000.0,
            min_unit_rate: 51000.0,
            max_unit_rate: 63000.0,
            standard_deviation: 4000.0,
            sample_size: 5,
            last_updated: Utc::now(),
            base_year: 2024,
        };

        let same = NormalizationTarget::new(2024, "Assam").as_of(as_of());
        let p = normalizer.project_benchmark(&benchmark, &same);
        assert!((p.scale - 1.0).abs() < 1e-12);
        assert_eq!(p.normalized_unit_rate, 57000.0);

        // 宏观区域基准 (无地区系数) 投影到 Assam
        let mut regional = benchmark.clone();
        regional.region = "North Eastern Region".to_string();
        let p = normalizer.project_benchmark(&regional, &same);
        assert!((p.regional_factor - 1.15).abs() < 1e-12);
    }
}
