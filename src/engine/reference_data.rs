// ==========================================
// DPR 价格分析核心 - 参考数据初始化
// ==========================================
// 职责: 按类别默认年增长率生成通胀累计系数并写入仓储
// 红线: 基准年累计系数恒为 1.0
// ==========================================

use crate::domain::{CostCategory, InflationFactor};
use crate::engine::cost_normalizer::InflationDefaults;
use crate::repository::{CostDataRepository, RepositoryResult};
use std::ops::RangeInclusive;
use tracing::info;

/// 生成单个类别的通胀系数序列
///
/// cumulative(year) = (1 + rate)^(year - base_year), 基准年前的年份系数小于 1.0
pub fn build_inflation_series(
    category: CostCategory,
    base_year: i32,
    years: RangeInclusive<i32>,
    rate: f64,
) -> Vec<InflationFactor> {
    years
        .map(|year| InflationFactor {
            year,
            category,
            inflation_rate: rate,
            cumulative_factor: (1.0 + rate).powi(year - base_year),
            base_year,
        })
        .collect()
}

/// 为全部类别写入通胀系数 (已有记录被覆盖)
///
/// # 返回
/// 写入的记录条数
pub fn seed_inflation_factors<R>(
    repo: &R,
    defaults: &InflationDefaults,
    years: RangeInclusive<i32>,
) -> RepositoryResult<usize>
where
    R: CostDataRepository + ?Sized,
{
    let mut written = 0;
    for category in CostCategory::ALL {
        let series = build_inflation_series(
            category,
            defaults.base_year,
            years.clone(),
            defaults.rate_for(category),
        );
        for factor in &series {
            repo.upsert_inflation_factor(factor)?;
            written += 1;
        }
    }

    info!(
        base_year = defaults.base_year,
        from = years.start(),
        to = years.end(),
        written,
        "通胀系数初始化完成"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryCostRepository;

    #[test]
    fn test_base_year_factor_is_one() {
        let series = build_inflation_series(CostCategory::Labor, 2020, 2018..=2025, 0.08);
        assert_eq!(series.len(), 8);
        let base = series.iter().find(|f| f.year == 2020).unwrap();
        assert_eq!(base.cumulative_factor, 1.0);
        assert!(series.iter().find(|f| f.year == 2019).unwrap().cumulative_factor < 1.0);
        assert!((series.last().unwrap().cumulative_factor - 1.08f64.powi(5)).abs() < 1e-12);
    }

    #[test]
    fn test_seed_writes_every_category() {
        let repo = InMemoryCostRepository::new();
        let defaults = InflationDefaults::default();
        let written = seed_inflation_factors(&repo, &defaults, 2020..=2024).unwrap();
        assert_eq!(written, CostCategory::ALL.len() * 5);

        for category in CostCategory::ALL {
            let base = repo.get_inflation_factor(2020, category, 2020).unwrap().unwrap();
            assert_eq!(base.cumulative_factor, 1.0);
        }
    }
}
