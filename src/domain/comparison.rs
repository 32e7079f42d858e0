// ==========================================
// DPR 价格分析核心 - 价格比对结果实体
// ==========================================
// 职责: 单项比对 / 标记项 / 项目级汇总
// 说明: 结果按请求生成, 不要求持久化
// ==========================================

use crate::domain::cost_item::ItemFailure;
use crate::domain::types::{CostCategory, FlagType, FundingAlignment, PriceClassification};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// PriceFlaggedItem - 被标记的明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFlaggedItem {
    pub item_category: CostCategory,
    pub item_description: String,
    pub dpr_unit_rate: f64,
    pub benchmark_unit_rate: f64,
    pub deviation_percentage: f64,
    pub flag_type: FlagType,
    pub confidence: f64,
    pub recommendation: String,
}

// ==========================================
// ItemComparison - 单项比对明细
// ==========================================
/// 每条有基准可比的 DPR 明细 (含 NORMAL)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemComparison {
    /// 在提交列表中的下标
    pub item_index: usize,
    pub item_category: CostCategory,
    pub item_description: String,
    pub unit: Option<String>,
    pub quantity: f64,
    pub dpr_unit_rate: f64,
    pub dpr_total_cost: f64,
    /// 实际使用的基准所属地区 (邦或宏观区域)
    pub benchmark_region: String,
    /// 投影到目标年/目标邦后的基准单价
    pub benchmark_unit_rate: f64,
    pub benchmark_implied_total: f64,
    pub deviation_percentage: f64,
    pub z_score: f64,
    pub statistically_significant: bool,
    pub confidence: f64,
    pub sample_size: usize,
    pub classification: PriceClassification,
}

// ==========================================
// SkippedItem - 无基准可比的明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedItem {
    pub item_index: usize,
    pub item_category: CostCategory,
    pub item_description: String,
    pub reason: String,
}

// ==========================================
// PriceComparisonResult - 项目级比对结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceComparisonResult {
    pub project_id: String,
    /// 所有有效明细的总价之和
    pub total_estimate: f64,
    /// 有基准明细的基准隐含总价之和
    pub regional_average: f64,
    /// 仅在有基准的明细上计算
    pub deviation_percentage: f64,
    pub flagged_items: Vec<PriceFlaggedItem>,
    pub recommendations: Vec<String>,
    pub analysis_timestamp: DateTime<Utc>,
    pub compared_items: Vec<ItemComparison>,
    pub skipped_items: Vec<SkippedItem>,
    pub item_errors: Vec<ItemFailure>,
    pub scheme_confidence: Option<f64>,
}

// ==========================================
// SchemeEligibility - 计划适配性
// ==========================================
/// 计划/资助适配性的显式结构 (供置信度评分使用)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeEligibility {
    pub funding_alignment: FundingAlignment,
    pub regional_applicability: bool,
    pub sector_alignment: bool,
}
