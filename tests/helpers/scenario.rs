// ==========================================
// 测试场景 - 阿萨姆邦沥青报价
// ==========================================
// 历史: 5 条 "Bitumen, MT" (2020 基准价), 阿萨姆材料系数 1.15, 2024 材料累计通胀 1.065
// 归一化倍数: 1.15 * 1.065 = 1.22475
// ==========================================

use super::test_data_builder::{date, historical_series, inflation, state_factor};
use chrono::NaiveDate;
use dpr_price_analyzer::domain::CostCategory;
use dpr_price_analyzer::engine::{BenchmarkOptions, ComparisonOptions};
use dpr_price_analyzer::{CostDataRepository, InMemoryCostRepository};
use std::sync::Arc;

pub const TARGET_YEAR: i32 = 2024;
pub const STATE: &str = "Assam";
pub const BITUMEN: &str = "Bitumen, MT";
pub const BITUMEN_RATES: [f64; 5] = [42000.0, 45000.0, 46000.0, 48000.0, 52000.0];
pub const ASSAM_MATERIALS_FACTOR: f64 = 1.15;
pub const MATERIALS_2024_INFLATION: f64 = 1.065;

/// 历史单价到 (Assam, 2024) 口径的倍数
pub fn bitumen_scale() -> f64 {
    ASSAM_MATERIALS_FACTOR * MATERIALS_2024_INFLATION
}

/// 归一化后的沥青基准均价 (46600 * 1.22475)
pub fn expected_bitumen_mean() -> f64 {
    46600.0 * bitumen_scale()
}

pub fn as_of() -> NaiveDate {
    date(2024, 6, 1)
}

pub fn benchmark_options() -> BenchmarkOptions {
    BenchmarkOptions {
        target_year: TARGET_YEAR,
        as_of: as_of(),
        ..Default::default()
    }
}

pub fn comparison_options(state: &str) -> ComparisonOptions {
    let mut options = ComparisonOptions::new(TARGET_YEAR, state);
    options.as_of = as_of();
    options
}

/// 写入参考系数 (地区系数 + 2020/2024 材料通胀)
pub fn seed_reference_factors<R: CostDataRepository + ?Sized>(repo: &R) {
    repo.upsert_regional_cost_factor(&state_factor(
        STATE,
        CostCategory::Materials,
        ASSAM_MATERIALS_FACTOR,
    ))
    .expect("写入地区系数失败");
    repo.upsert_inflation_factor(&inflation(2020, CostCategory::Materials, 1.0))
        .expect("写入基准年通胀失败");
    repo.upsert_inflation_factor(&inflation(
        TARGET_YEAR,
        CostCategory::Materials,
        MATERIALS_2024_INFLATION,
    ))
    .expect("写入 2024 通胀失败");
}

/// 写入参考系数 + 5 条沥青历史明细
pub fn seed_bitumen_scenario<R: CostDataRepository + ?Sized>(repo: &R) {
    seed_reference_factors(repo);
    for item in historical_series(CostCategory::Materials, BITUMEN, STATE, &BITUMEN_RATES) {
        repo.insert_historical_cost_item(&item)
            .expect("写入历史明细失败");
    }
}

pub fn bitumen_repo() -> Arc<InMemoryCostRepository> {
    let repo = Arc::new(InMemoryCostRepository::new());
    seed_bitumen_scenario(repo.as_ref());
    repo
}
