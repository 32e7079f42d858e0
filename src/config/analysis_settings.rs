// ==========================================
// DPR 价格分析核心 - 分析配置快照
// ==========================================
// 职责: 配置值的内存表示 + 构造引擎所需的显式参数
// 说明: 自身也实现 AnalysisConfigReader, 可直接作为固定配置使用
// ==========================================

use crate::config::analysis_config_trait::AnalysisConfigReader;
use crate::domain::CostCategory;
use crate::engine::benchmark_calculator::{
    BenchmarkOptions, MacroRegion, DEFAULT_CONFIDENCE_LEVEL, DEFAULT_MACRO_REGION_LABEL,
    DEFAULT_MIN_SAMPLE_SIZE, DEFAULT_OUTLIER_Z_THRESHOLD, NORTH_EASTERN_STATES,
};
use crate::engine::cost_normalizer::{
    InflationDefaults, DEFAULT_ANNUAL_INFLATION_RATE, DEFAULT_BASE_YEAR,
};
use crate::engine::price_comparator::{ComparisonOptions, DEFAULT_DEVIATION_THRESHOLD};
use crate::repository::RepositoryResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// AnalysisSettings - 分析配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSettings {
    pub deviation_threshold: f64,
    pub confidence_level: f64,
    pub allow_ad_hoc_benchmarks: bool,
    pub min_sample_size: usize,
    pub outlier_z_threshold: f64,
    pub include_outliers: bool,
    pub benchmark_states: Vec<String>,
    pub macro_region_label: String,
    pub macro_region_states: Vec<String>,
    pub base_year: i32,
    pub inflation_rates: HashMap<CostCategory, f64>,
    pub fallback_inflation_rate: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        let states: Vec<String> = NORTH_EASTERN_STATES.iter().map(|s| s.to_string()).collect();
        Self {
            deviation_threshold: DEFAULT_DEVIATION_THRESHOLD,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            allow_ad_hoc_benchmarks: true,
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
            outlier_z_threshold: DEFAULT_OUTLIER_Z_THRESHOLD,
            include_outliers: false,
            benchmark_states: states.clone(),
            macro_region_label: DEFAULT_MACRO_REGION_LABEL.to_string(),
            macro_region_states: states,
            base_year: DEFAULT_BASE_YEAR,
            inflation_rates: InflationDefaults::default().annual_rates,
            fallback_inflation_rate: DEFAULT_ANNUAL_INFLATION_RATE,
        }
    }
}

impl AnalysisSettings {
    pub fn macro_region(&self) -> MacroRegion {
        MacroRegion {
            label: self.macro_region_label.clone(),
            states: self.macro_region_states.clone(),
        }
    }

    pub fn inflation_defaults(&self) -> InflationDefaults {
        InflationDefaults {
            base_year: self.base_year,
            annual_rates: self.inflation_rates.clone(),
            fallback_rate: self.fallback_inflation_rate,
        }
    }

    /// 构造基准计算参数
    pub fn benchmark_options(&self, target_year: i32, as_of: NaiveDate) -> BenchmarkOptions {
        BenchmarkOptions {
            min_sample_size: self.min_sample_size,
            outlier_z_threshold: self.outlier_z_threshold,
            confidence_level: self.confidence_level,
            target_year,
            include_outliers: self.include_outliers,
            as_of,
        }
    }

    /// 构造比对参数
    pub fn comparison_options(
        &self,
        target_year: i32,
        target_state: &str,
        target_district: Option<&str>,
    ) -> ComparisonOptions {
        let mut options = ComparisonOptions::new(target_year, target_state)
            .with_district(target_district);
        options.deviation_threshold = self.deviation_threshold;
        options.confidence_level = self.confidence_level;
        options.min_sample_size = self.min_sample_size;
        options.outlier_z_threshold = self.outlier_z_threshold;
        options.allow_ad_hoc_benchmarks = self.allow_ad_hoc_benchmarks;
        options.macro_region = self.macro_region();
        options
    }
}

#[async_trait]
impl AnalysisConfigReader for AnalysisSettings {
    async fn get_deviation_threshold(&self) -> RepositoryResult<f64> {
        Ok(self.deviation_threshold)
    }

    async fn get_confidence_level(&self) -> RepositoryResult<f64> {
        Ok(self.confidence_level)
    }

    async fn get_allow_ad_hoc_benchmarks(&self) -> RepositoryResult<bool> {
        Ok(self.allow_ad_hoc_benchmarks)
    }

    async fn get_min_sample_size(&self) -> RepositoryResult<usize> {
        Ok(self.min_sample_size)
    }

    async fn get_outlier_z_threshold(&self) -> RepositoryResult<f64> {
        Ok(self.outlier_z_threshold)
    }

    async fn get_include_outliers(&self) -> RepositoryResult<bool> {
        Ok(self.include_outliers)
    }

    async fn get_benchmark_states(&self) -> RepositoryResult<Vec<String>> {
        Ok(self.benchmark_states.clone())
    }

    async fn get_macro_region_label(&self) -> RepositoryResult<String> {
        Ok(self.macro_region_label.clone())
    }

    async fn get_macro_region_states(&self) -> RepositoryResult<Vec<String>> {
        Ok(self.macro_region_states.clone())
    }

    async fn get_base_year(&self) -> RepositoryResult<i32> {
        Ok(self.base_year)
    }

    async fn get_inflation_rates(&self) -> RepositoryResult<HashMap<CostCategory, f64>> {
        Ok(self.inflation_rates.clone())
    }

    async fn load_settings(&self) -> RepositoryResult<AnalysisSettings> {
        Ok(self.clone())
    }
}
