// ==========================================
// BenchmarkCalculator 集成测试
// ==========================================
// 测试目标: 归一化后统计 / 离群值剔除 / 幂等写入 / 宏观区域汇总 / 样本不足
// ==========================================

mod helpers;

use dpr_price_analyzer::domain::CostCategory;
use dpr_price_analyzer::engine::{
    BenchmarkCalculator, BenchmarkOptions, CostNormalizer, MacroRegion,
};
use dpr_price_analyzer::{logging, CostDataRepository, InMemoryCostRepository};
use helpers::scenario::{self, bitumen_scale, expected_bitumen_mean, STATE, TARGET_YEAR};
use helpers::test_data_builder::*;
use std::sync::Arc;

fn calculator(repo: &Arc<InMemoryCostRepository>) -> BenchmarkCalculator<InMemoryCostRepository> {
    let normalizer = Arc::new(CostNormalizer::new(repo.clone()));
    BenchmarkCalculator::new(repo.clone(), normalizer)
}

fn insert_all(repo: &InMemoryCostRepository, items: &[dpr_price_analyzer::HistoricalCostItem]) {
    for item in items {
        repo.insert_historical_cost_item(item).unwrap();
    }
}

/// 基准年口径 (无参考数据时两个系数均为 1.0)
fn base_year_options() -> BenchmarkOptions {
    BenchmarkOptions {
        target_year: 2020,
        as_of: date(2020, 6, 1),
        ..Default::default()
    }
}

// ==========================================
// 统计口径
// ==========================================

#[test]
fn test_bitumen_benchmark_uses_normalized_rates() {
    logging::init_test();

    let repo = scenario::bitumen_repo();
    let result = calculator(&repo)
        .calculate_category_benchmarks(CostCategory::Materials, STATE, &scenario::benchmark_options())
        .unwrap();

    assert_eq!(result.benchmarks.len(), 1);
    assert!(result.failures.is_empty());
    assert!(result.persist_errors.is_empty());

    let calculated = &result.benchmarks[0];
    let b = &calculated.benchmark;
    assert_eq!(b.item_description, "bitumen mt");
    assert_eq!(b.region, STATE);
    assert_eq!(b.base_year, TARGET_YEAR);
    assert_eq!(b.sample_size, 5);
    assert_eq!(calculated.group_size, 5);
    assert!(calculated.removed_outliers.is_empty());

    assert!((b.average_unit_rate - expected_bitumen_mean()).abs() < 1e-4);
    assert!((b.median_unit_rate - 46000.0 * bitumen_scale()).abs() < 1e-4);
    assert!((b.min_unit_rate - 42000.0 * bitumen_scale()).abs() < 1e-4);
    assert!((b.max_unit_rate - 52000.0 * bitumen_scale()).abs() < 1e-4);

    // 总体标准差: sqrt(11_040_000) 再乘归一化倍数
    let expected_sd = 11_040_000.0_f64.sqrt() * bitumen_scale();
    assert!((b.standard_deviation - expected_sd).abs() < 1e-4);
    assert!(b.min_unit_rate <= b.median_unit_rate && b.median_unit_rate <= b.max_unit_rate);
}

#[test]
fn test_outliers_removed_unless_included() {
    let repo = Arc::new(InMemoryCostRepository::new());
    let rates = [100.0, 101.0, 99.0, 100.0, 102.0, 98.0, 100.0, 101.0, 99.0, 300.0];
    insert_all(
        &repo,
        &historical_series(CostCategory::Labor, "Mason daily wage", "Goa", &rates),
    );
    let calculator = calculator(&repo);

    let excluded = calculator
        .calculate_category_benchmarks(CostCategory::Labor, "Goa", &base_year_options())
        .unwrap();
    assert_eq!(excluded.benchmarks.len(), 1);
    let trimmed = &excluded.benchmarks[0];
    assert_eq!(trimmed.benchmark.sample_size, 9);
    assert_eq!(trimmed.group_size, 10);
    assert_eq!(trimmed.removed_outliers, vec![300.0]);
    assert!(trimmed.benchmark.max_unit_rate < 300.0);

    let options = BenchmarkOptions {
        include_outliers: true,
        ..base_year_options()
    };
    let included = calculator
        .calculate_category_benchmarks(CostCategory::Labor, "Goa", &options)
        .unwrap();
    let full = &included.benchmarks[0];
    assert_eq!(full.benchmark.sample_size, 10);
    assert!(full.removed_outliers.is_empty());
    assert!((full.benchmark.average_unit_rate - 120.0).abs() < 1e-9);
}

#[test]
fn test_similar_descriptions_share_one_group() {
    let repo = Arc::new(InMemoryCostRepository::new());
    let descriptions = [
        "Cement OPC 53 Grade",
        "cement opc 53 grade",
        "Cement, OPC 53 Grade.",
        "CEMENT  OPC 53 GRADE",
        "Cement OPC 53 Grade",
    ];
    for (i, description) in descriptions.iter().enumerate() {
        let item = HistoricalItemBuilder::new(CostCategory::Materials, description, 400.0 + i as f64)
            .state("Meghalaya")
            .unit("bag")
            .build();
        repo.insert_historical_cost_item(&item).unwrap();
    }

    let result = calculator(&repo)
        .calculate_category_benchmarks(CostCategory::Materials, "Meghalaya", &base_year_options())
        .unwrap();

    assert_eq!(result.benchmarks.len(), 1);
    let b = &result.benchmarks[0].benchmark;
    assert_eq!(b.item_description, "cement opc 53 grade");
    assert_eq!(b.sample_size, 5);
    assert_eq!(b.unit.as_deref(), Some("bag"));
}

#[test]
fn test_small_group_skipped_while_other_group_produced() {
    let repo = scenario::bitumen_repo();
    insert_all(
        &repo,
        &historical_series(CostCategory::Materials, "River sand", STATE, &[1800.0, 1900.0, 2000.0]),
    );

    let result = calculator(&repo)
        .calculate_category_benchmarks(CostCategory::Materials, STATE, &scenario::benchmark_options())
        .unwrap();

    assert_eq!(result.benchmarks.len(), 1);
    assert_eq!(result.benchmarks[0].benchmark.item_description, "bitumen mt");
    assert_eq!(result.skipped_groups.len(), 1);
    assert_eq!(result.skipped_groups[0].description, "river sand");
    assert_eq!(result.skipped_groups[0].group_size, 3);
    assert!(result.skipped_groups[0].reason.contains("river sand"));
    assert!(result.skipped_groups[0]
        .reason
        .contains("需要至少 5 条, 实际 3 条"));
}

#[test]
fn test_malformed_history_item_is_isolated() {
    let repo = scenario::bitumen_repo();
    let broken = HistoricalItemBuilder::new(CostCategory::Materials, scenario::BITUMEN, 0.0)
        .id("BIT-BROKEN")
        .build();
    repo.insert_historical_cost_item(&broken).unwrap();

    let result = calculator(&repo)
        .calculate_category_benchmarks(CostCategory::Materials, STATE, &scenario::benchmark_options())
        .unwrap();

    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].item_id, "BIT-BROKEN");
    assert_eq!(result.benchmarks.len(), 1);
    assert_eq!(result.benchmarks[0].benchmark.sample_size, 5);
}

// ==========================================
// 幂等写入
// ==========================================

#[test]
fn test_recalculation_updates_single_row() {
    let repo = scenario::bitumen_repo();
    let calculator = calculator(&repo);
    let options = scenario::benchmark_options();

    let first = calculator
        .calculate_category_benchmarks(CostCategory::Materials, STATE, &options)
        .unwrap();
    let first_id = first.benchmarks[0].benchmark.id.clone();

    insert_all(
        &repo,
        &historical_series(CostCategory::Materials, scenario::BITUMEN, STATE, &[47000.0]),
    );
    let second = calculator
        .calculate_category_benchmarks(CostCategory::Materials, STATE, &options)
        .unwrap();

    assert_eq!(repo.benchmark_count().unwrap(), 1);
    assert_eq!(second.benchmarks[0].benchmark.id, first_id);

    let stored = repo
        .get_price_benchmark(CostCategory::Materials, "bitumen mt", STATE, None)
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, first_id);
    assert_eq!(stored.sample_size, 6);
}

// ==========================================
// 样本不足
// ==========================================

#[test]
fn test_insufficient_history_produces_nothing() {
    let repo = Arc::new(InMemoryCostRepository::new());
    insert_all(
        &repo,
        &historical_series(
            CostCategory::Equipment,
            "Excavator hire per hour",
            "Nagaland",
            &[2500.0, 2600.0, 2700.0, 2800.0],
        ),
    );

    let result = calculator(&repo)
        .calculate_category_benchmarks(CostCategory::Equipment, "Nagaland", &base_year_options())
        .unwrap();

    assert!(result.benchmarks.is_empty());
    assert!(result.failures.is_empty());
    assert_eq!(repo.benchmark_count().unwrap(), 0);
}

// ==========================================
// 宏观区域
// ==========================================

#[test]
fn test_macro_region_pools_member_states() {
    let repo = Arc::new(InMemoryCostRepository::new());
    let sand = "River sand";
    insert_all(
        &repo,
        &historical_series(CostCategory::Materials, sand, "Assam", &[1800.0, 1850.0, 1900.0]),
    );
    insert_all(
        &repo,
        &historical_series(CostCategory::Materials, sand, "Manipur", &[1950.0, 2000.0, 2050.0]),
    );
    // 非成员邦不参与
    insert_all(
        &repo,
        &historical_series(CostCategory::Materials, sand, "Goa", &[900.0, 950.0, 1000.0]),
    );
    let calculator = calculator(&repo);
    let options = base_year_options();

    let state_level = calculator
        .calculate_category_benchmarks(CostCategory::Materials, "Assam", &options)
        .unwrap();
    assert!(state_level.benchmarks.is_empty());

    let macro_region = MacroRegion::north_eastern();
    let pooled = calculator
        .calculate_macro_region_benchmarks(CostCategory::Materials, &macro_region, &options)
        .unwrap();

    assert_eq!(pooled.region, "North Eastern Region");
    assert_eq!(pooled.benchmarks.len(), 1);
    let b = &pooled.benchmarks[0].benchmark;
    assert_eq!(b.region, "North Eastern Region");
    assert_eq!(b.sample_size, 6);
    assert!((b.average_unit_rate - 1925.0).abs() < 1e-9);
    assert!(b.min_unit_rate >= 1800.0);
}

#[test]
fn test_custom_macro_region_membership() {
    let region = MacroRegion::new("Eastern Hills", &["Sikkim", "Meghalaya"]);
    assert!(region.contains("sikkim"));
    assert!(region.contains("Meghalaya"));
    assert!(!region.contains("Assam"));
    assert!(MacroRegion::north_eastern().contains("Arunachal Pradesh"));
}

// ==========================================
// 临时基准
// ==========================================

#[test]
fn test_ad_hoc_benchmark_keyed_by_submitted_description() {
    let repo = scenario::bitumen_repo();
    let calculator = calculator(&repo);
    let options = scenario::benchmark_options();

    let first = calculator
        .calculate_for_description(CostCategory::Materials, "BITUMEN (MT)", STATE, &options)
        .unwrap()
        .expect("相似明细充足时应产出基准");
    assert_eq!(first.benchmark.item_description, "bitumen mt");
    assert_eq!(first.benchmark.sample_size, 5);

    let second = calculator
        .calculate_for_description(CostCategory::Materials, "Bitumen MT", STATE, &options)
        .unwrap()
        .unwrap();
    assert_eq!(second.benchmark.id, first.benchmark.id);
    assert_eq!(repo.benchmark_count().unwrap(), 1);

    let none = calculator
        .calculate_for_description(CostCategory::Materials, "Granite slab", STATE, &options)
        .unwrap();
    assert!(none.is_none());
}

#[test]
fn test_region_case_variants_update_same_benchmark() {
    let repo = scenario::bitumen_repo();
    let calculator = calculator(&repo);
    let options = scenario::benchmark_options();

    calculator
        .calculate_category_benchmarks(CostCategory::Materials, STATE, &options)
        .unwrap();
    calculator
        .calculate_category_benchmarks(CostCategory::Materials, &STATE.to_uppercase(), &options)
        .unwrap();

    assert_eq!(repo.benchmark_count().unwrap(), 1);
    let stored = repo
        .get_price_benchmark(CostCategory::Materials, "bitumen mt", "assam", None)
        .unwrap()
        .unwrap();
    assert_eq!(stored.region, STATE);
}
