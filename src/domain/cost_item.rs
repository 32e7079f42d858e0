// ==========================================
// DPR 价格分析核心 - 成本明细实体
// ==========================================
// 职责: 历史成本明细 / DPR 提交明细 / 归一化结果
// 红线: 归一化字段只能通过显式重新归一化写回
// ==========================================

use crate::domain::types::{CostCategory, FactorSource, InflationSource};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// HistoricalCostItem - 历史成本明细
// ==========================================
/// 历史项目中的一条成本明细
///
/// `state` / `district` 为所属历史项目的地点 (冗余存储, 便于按邦查询)。
/// `normalized_unit_rate` / `regional_factor` / `inflation_factor` 在首次归一化前为空。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalCostItem {
    pub id: String,
    pub project_id: String,
    pub category: CostCategory,
    pub description: String,
    pub unit: Option<String>,
    pub quantity: Option<f64>,
    pub unit_rate: f64,
    pub total_cost: f64,
    pub state: String,
    pub district: Option<String>,
    pub normalized_unit_rate: Option<f64>,
    pub regional_factor: Option<f64>,
    pub inflation_factor: Option<f64>,
}

impl HistoricalCostItem {
    /// 创建历史成本明细 (id 自动生成, total_cost = unit_rate)
    pub fn new(
        project_id: &str,
        category: CostCategory,
        description: &str,
        unit_rate: f64,
        state: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            category,
            description: description.to_string(),
            unit: None,
            quantity: None,
            unit_rate,
            total_cost: unit_rate,
            state: state.to_string(),
            district: None,
            normalized_unit_rate: None,
            regional_factor: None,
            inflation_factor: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    /// 设置数量, 同时重算 total_cost
    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self.total_cost = self.unit_rate * quantity;
        self
    }

    pub fn with_district(mut self, district: &str) -> Self {
        self.district = Some(district.to_string());
        self
    }

    /// 是否已写入归一化结果
    pub fn is_normalized(&self) -> bool {
        self.normalized_unit_rate.is_some()
    }

    /// 写回归一化结果 (重新归一化会覆盖旧值)
    pub fn apply_normalization(&mut self, normalized: &NormalizedCost) {
        self.normalized_unit_rate = Some(normalized.normalized_unit_rate);
        self.regional_factor = Some(normalized.regional_factor);
        self.inflation_factor = Some(normalized.inflation_factor);
    }
}

// ==========================================
// DprCostItem - DPR 提交的成本明细
// ==========================================
/// 待评估项目 (DPR) 的成本明细, 不由本核心持久化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DprCostItem {
    pub category: CostCategory,
    pub description: String,
    pub unit: Option<String>,
    pub quantity: f64,
    pub unit_rate: f64,
    pub total_cost: f64,
}

impl DprCostItem {
    /// 创建 DPR 明细 (total_cost = unit_rate * quantity)
    pub fn new(
        category: CostCategory,
        description: &str,
        unit: Option<&str>,
        quantity: f64,
        unit_rate: f64,
    ) -> Self {
        Self {
            category,
            description: description.to_string(),
            unit: unit.map(|u| u.to_string()),
            quantity,
            unit_rate,
            total_cost: unit_rate * quantity,
        }
    }
}

// ==========================================
// NormalizedCost - 归一化结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCost {
    pub item_id: String,
    pub normalized_unit_rate: f64,
    pub normalized_total_cost: f64,
    pub regional_factor: f64,
    pub inflation_factor: f64,
    pub breakdown: NormalizationBreakdown,
}

impl NormalizedCost {
    /// 恒等归一化 (两个系数均为 1.0), 用于批处理中失败项的兜底
    pub fn identity(item: &HistoricalCostItem, target_year: i32, target_state: &str) -> Self {
        let normalized_total_cost = match item.quantity {
            Some(q) => item.unit_rate * q,
            None => item.unit_rate,
        };
        Self {
            item_id: item.id.clone(),
            normalized_unit_rate: item.unit_rate,
            normalized_total_cost,
            regional_factor: 1.0,
            inflation_factor: 1.0,
            breakdown: NormalizationBreakdown {
                original_unit_rate: item.unit_rate,
                regional_adjusted_rate: item.unit_rate,
                regional_source: FactorSource::Default,
                inflation_source: InflationSource::Approximated,
                target_year,
                target_state: target_state.to_string(),
                target_district: None,
                missing_references: Vec::new(),
            },
        }
    }

    /// 是否使用了任何兜底系数
    pub fn used_fallback(&self) -> bool {
        self.breakdown.regional_source.is_fallback() || self.breakdown.inflation_source.is_fallback()
    }
}

/// 归一化计算明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationBreakdown {
    pub original_unit_rate: f64,
    pub regional_adjusted_rate: f64,
    pub regional_source: FactorSource,
    pub inflation_source: InflationSource,
    pub target_year: i32,
    pub target_state: String,
    pub target_district: Option<String>,
    /// 缺失参考数据的说明 (对应使用了兜底系数的项)
    #[serde(default)]
    pub missing_references: Vec<String>,
}

// ==========================================
// ItemFailure - 批处理单项失败记录
// ==========================================
/// 批处理中被隔离的失败项
///
/// `fallback` 为失败项按恒等系数得到的兜底结果 (若适用)。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub item_id: String,
    pub description: String,
    pub error: String,
    pub fallback: Option<NormalizedCost>,
}
