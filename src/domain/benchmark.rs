// ==========================================
// DPR 价格分析核心 - 价格基准实体
// ==========================================
// 唯一键: (item_category, item_description, region)
// 红线: 同一键只能有一条逻辑记录, 重算必须覆盖而非追加
// ==========================================

use crate::domain::types::CostCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// PriceBenchmark - 价格基准
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBenchmark {
    pub id: String,
    pub item_category: CostCategory,
    /// 归一化后的分组描述 (canonical label)
    pub item_description: String,
    pub unit: Option<String>,
    pub region: String,
    pub average_unit_rate: f64,
    pub median_unit_rate: f64,
    pub min_unit_rate: f64,
    pub max_unit_rate: f64,
    pub standard_deviation: f64,
    pub sample_size: usize,
    pub last_updated: DateTime<Utc>,
    /// 基准价格所处的年份 (计算时的目标年)
    pub base_year: i32,
}

impl PriceBenchmark {
    /// 唯一键
    pub fn key(&self) -> BenchmarkKey {
        BenchmarkKey {
            category: self.item_category,
            description: self.item_description.clone(),
            region: self.region.clone(),
        }
    }

    /// 单位是否兼容 (任一方缺失视为兼容, 大小写不敏感)
    pub fn accepts_unit(&self, unit: Option<&str>) -> bool {
        units_compatible(self.unit.as_deref(), unit)
    }
}

/// 价格基准唯一键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BenchmarkKey {
    pub category: CostCategory,
    pub description: String,
    pub region: String,
}

impl BenchmarkKey {
    /// 逻辑键是否相同 (地区大小写不敏感)
    pub fn matches(&self, other: &BenchmarkKey) -> bool {
        self.category == other.category
            && self.description == other.description
            && self.region.eq_ignore_ascii_case(&other.region)
    }
}

impl std::fmt::Display for BenchmarkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.category, self.description, self.region)
    }
}

/// 单位兼容判定
pub fn units_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        _ => true,
    }
}

// ==========================================
// BenchmarkStatistics - 基准统计明细 (审计用)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub confidence_interval: ConfidenceInterval,
}

/// 均值置信区间
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceInterval {
    pub level: f64,
    pub lower: f64,
    pub upper: f64,
}
