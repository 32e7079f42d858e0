// ==========================================
// 配置层集成测试
// ==========================================
// 测试目标: 默认值 / 覆盖值 / 非法值降级 / 配置 -> 引擎参数映射
// ==========================================


use dpr_price_analyzer::config::{config_keys, AnalysisConfigReader, AnalysisSettings, ConfigManager};
use dpr_price_analyzer::domain::CostCategory;
use dpr_price_analyzer::engine::benchmark_calculator::NORTH_EASTERN_STATES;

#[tokio::test]
async fn test_defaults_when_nothing_configured() {
    let (_temp, db_path) = test_helpers::create_test_db().unwrap();
    let config = ConfigManager::new(&db_path).unwrap();

    let settings = config.load_settings().await.unwrap();
    assert_eq!(settings, AnalysisSettings::default());
    assert!((settings.deviation_threshold - 0.20).abs() < 1e-12);
    assert!((settings.confidence_level - 0.95).abs() < 1e-12);
    assert_eq!(settings.min_sample_size, 5);
    assert!((settings.outlier_z_threshold - 2.0).abs() < 1e-12);
    assert!(settings.allow_ad_hoc_benchmarks);
    assert!(!settings.include_outliers);
    assert_eq!(settings.base_year, 2020);
    assert_eq!(settings.macro_region_label, "North Eastern Region");
    assert_eq!(settings.macro_region_states.len(), NORTH_EASTERN_STATES.len());
}

#[tokio::test]
async fn test_overrides_are_applied() {
    let (_temp, repo, config) = test_helpers::create_test_repo().unwrap();
    drop(repo);

    let overrides = [
        (config_keys::DEVIATION_THRESHOLD, "0.3"),
        (config_keys::CONFIDENCE_LEVEL, "0.99"),
        (config_keys::MIN_SAMPLE_SIZE, "8"),
        (config_keys::INCLUDE_OUTLIERS, "true"),
        (config_keys::BENCHMARK_STATES, "Assam, Tripura ,,Sikkim"),
        (config_keys::MACRO_REGION_LABEL, "Eastern Hills"),
        (config_keys::MACRO_REGION_STATES, "Sikkim,Meghalaya"),
        (config_keys::BASE_YEAR, "2018"),
        (config_keys::INFLATION_RATES, r#"{"LABOUR": 0.1, "transport": 0.04}"#),
    ];
    for (key, value) in overrides {
        config.set_global_config_value(key, value).unwrap();
    }

    let settings = config.load_settings().await.unwrap();
    assert!((settings.deviation_threshold - 0.3).abs() < 1e-12);
    assert!((settings.confidence_level - 0.99).abs() < 1e-12);
    assert_eq!(settings.min_sample_size, 8);
    assert!(settings.include_outliers);
    assert_eq!(settings.benchmark_states, vec!["Assam", "Tripura", "Sikkim"]);
    assert_eq!(settings.base_year, 2018);
    assert_eq!(settings.inflation_rates.get(&CostCategory::Labor), Some(&0.1));
    assert_eq!(settings.inflation_rates.get(&CostCategory::Transport), Some(&0.04));
    // 未覆盖的类别保留默认值
    assert_eq!(settings.inflation_rates.get(&CostCategory::Materials), Some(&0.07));

    let macro_region = settings.macro_region();
    assert_eq!(macro_region.label, "Eastern Hills");
    assert!(macro_region.contains("sikkim"));
    assert!(!macro_region.contains("Assam"));

    let defaults = settings.inflation_defaults();
    assert_eq!(defaults.base_year, 2018);
    assert!((defaults.approximate_cumulative(CostCategory::Labor, 2020) - 1.21).abs() < 1e-12);
}

#[tokio::test]
async fn test_invalid_values_fall_back_to_defaults() {
    let (_temp, db_path) = test_helpers::create_test_db().unwrap();
    let config = ConfigManager::new(&db_path).unwrap();

    config
        .set_global_config_value(config_keys::MIN_SAMPLE_SIZE, "many")
        .unwrap();
    config
        .set_global_config_value(config_keys::DEVIATION_THRESHOLD, "")
        .unwrap();
    config
        .set_global_config_value(config_keys::INFLATION_RATES, "not json")
        .unwrap();
    config
        .set_global_config_value(config_keys::MACRO_REGION_LABEL, "   ")
        .unwrap();

    assert_eq!(config.get_min_sample_size().await.unwrap(), 5);
    assert!((config.get_deviation_threshold().await.unwrap() - 0.20).abs() < 1e-12);
    assert_eq!(
        config.get_inflation_rates().await.unwrap(),
        AnalysisSettings::default().inflation_rates
    );
    assert_eq!(
        config.get_macro_region_label().await.unwrap(),
        "North Eastern Region"
    );
}

#[tokio::test]
async fn test_value_overwrite() {
    let (_temp, db_path) = test_helpers::create_test_db().unwrap();
    let config = ConfigManager::new(&db_path).unwrap();

    assert_eq!(
        config
            .get_global_config_value(config_keys::BASE_YEAR)
            .unwrap(),
        None
    );
    config
        .set_global_config_value(config_keys::BASE_YEAR, "2019")
        .unwrap();
    config
        .set_global_config_value(config_keys::BASE_YEAR, "2021")
        .unwrap();
    assert_eq!(
        config
            .get_global_config_value(config_keys::BASE_YEAR)
            .unwrap()
            .as_deref(),
        Some("2021")
    );
    assert_eq!(config.get_base_year().await.unwrap(), 2021);
}

#[test]
fn test_settings_map_to_engine_options() {
    let settings = AnalysisSettings {
        deviation_threshold: 0.15,
        min_sample_size: 7,
        allow_ad_hoc_benchmarks: false,
        include_outliers: true,
        ..Default::default()
    };
    let as_of = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

    let benchmark = settings.benchmark_options(2024, as_of);
    assert_eq!(benchmark.min_sample_size, 7);
    assert_eq!(benchmark.target_year, 2024);
    assert_eq!(benchmark.as_of, as_of);
    assert!(benchmark.include_outliers);

    let comparison = settings.comparison_options(2024, "Assam", Some("Kamrup"));
    assert!((comparison.deviation_threshold - 0.15).abs() < 1e-12);
    assert_eq!(comparison.min_sample_size, 7);
    assert!(!comparison.allow_ad_hoc_benchmarks);
    assert_eq!(comparison.target_state, "Assam");
    assert_eq!(comparison.target_district.as_deref(), Some("Kamrup"));
    assert_eq!(comparison.macro_region.label, "North Eastern Region");
}
