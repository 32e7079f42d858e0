// ==========================================
// DPR 价格分析核心 - 分析配置读取 Trait
// ==========================================
// 职责: 定义基准计算/价格比对所需的配置读取接口 (不包含实现)
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::analysis_settings::AnalysisSettings;
use crate::domain::CostCategory;
use crate::repository::RepositoryResult;
use async_trait::async_trait;
use std::collections::HashMap;

// ==========================================
// AnalysisConfigReader Trait
// ==========================================
// 实现者: ConfigManager (config_kv 表) / AnalysisSettings (固定值)
#[async_trait]
pub trait AnalysisConfigReader: Send + Sync {
    // ===== 比对阈值 =====

    /// 偏差阈值 (比例)
    ///
    /// # 默认值
    /// - 0.20
    async fn get_deviation_threshold(&self) -> RepositoryResult<f64>;

    /// 置信水平
    ///
    /// # 默认值
    /// - 0.95
    async fn get_confidence_level(&self) -> RepositoryResult<f64>;

    /// 是否允许比对时临时计算基准
    ///
    /// # 默认值
    /// - true
    async fn get_allow_ad_hoc_benchmarks(&self) -> RepositoryResult<bool>;

    // ===== 基准计算 =====

    /// 最小样本量
    ///
    /// # 默认值
    /// - 5
    async fn get_min_sample_size(&self) -> RepositoryResult<usize>;

    /// 离群 z 分数阈值
    ///
    /// # 默认值
    /// - 2.0
    async fn get_outlier_z_threshold(&self) -> RepositoryResult<f64>;

    /// 统计时是否保留离群值
    ///
    /// # 默认值
    /// - false
    async fn get_include_outliers(&self) -> RepositoryResult<bool>;

    /// 需要计算邦级基准的邦
    async fn get_benchmark_states(&self) -> RepositoryResult<Vec<String>>;

    // ===== 宏观区域 =====

    /// 宏观区域标签
    ///
    /// # 默认值
    /// - "North Eastern Region"
    async fn get_macro_region_label(&self) -> RepositoryResult<String>;

    /// 宏观区域成员邦
    async fn get_macro_region_states(&self) -> RepositoryResult<Vec<String>>;

    // ===== 通胀 =====

    /// 通胀基准年
    ///
    /// # 默认值
    /// - 2020
    async fn get_base_year(&self) -> RepositoryResult<i32>;

    /// 各类别默认年增长率
    async fn get_inflation_rates(&self) -> RepositoryResult<HashMap<CostCategory, f64>>;

    /// 一次读取全部配置
    async fn load_settings(&self) -> RepositoryResult<AnalysisSettings> {
        let defaults = AnalysisSettings::default();
        Ok(AnalysisSettings {
            deviation_threshold: self.get_deviation_threshold().await?,
            confidence_level: self.get_confidence_level().await?,
            allow_ad_hoc_benchmarks: self.get_allow_ad_hoc_benchmarks().await?,
            min_sample_size: self.get_min_sample_size().await?,
            outlier_z_threshold: self.get_outlier_z_threshold().await?,
            include_outliers: self.get_include_outliers().await?,
            benchmark_states: self.get_benchmark_states().await?,
            macro_region_label: self.get_macro_region_label().await?,
            macro_region_states: self.get_macro_region_states().await?,
            base_year: self.get_base_year().await?,
            inflation_rates: self.get_inflation_rates().await?,
            fallback_inflation_rate: defaults.fallback_inflation_rate,
        })
    }
}
