// ==========================================
// DPR 价格分析核心 - 计划适配性评分
// ==========================================
// 职责: 资金区间匹配 + 地区适用 + 行业匹配 -> 适配置信度
// 输入: SchemeCriteria (计划条件) + 项目估算
// 输出: SchemeEligibility / 置信度 [0, 1]
// 红线: 评分确定性 (同输入同输出)
// ==========================================

use crate::domain::{CostCategory, FundingAlignment, SchemeEligibility};
use serde::{Deserialize, Serialize};

/// 各资金匹配度的权重
const FUNDING_WEIGHT_WITHIN: f64 = 0.4;
const FUNDING_WEIGHT_UNDER: f64 = 0.25;
const FUNDING_WEIGHT_OVER: f64 = 0.1;
const FUNDING_WEIGHT_UNKNOWN: f64 = 0.2;
const REGIONAL_WEIGHT: f64 = 0.3;
const SECTOR_WEIGHT: f64 = 0.3;

/// 资助计划的适用条件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeCriteria {
    pub min_funding: Option<f64>,
    pub max_funding: Option<f64>,
    /// 为空表示全国适用
    pub eligible_states: Vec<String>,
    /// 为空表示不限行业
    pub eligible_categories: Vec<CostCategory>,
}

/// 估算总额相对资助区间的位置
///
/// 两端均未知时为 Unknown; 只给出一端时按该端判定
pub fn classify_funding(
    project_cost: f64,
    min_funding: Option<f64>,
    max_funding: Option<f64>,
) -> FundingAlignment {
    match (min_funding, max_funding) {
        (None, None) => FundingAlignment::Unknown,
        (Some(min), _) if project_cost < min => FundingAlignment::Under,
        (_, Some(max)) if project_cost > max => FundingAlignment::Over,
        _ => FundingAlignment::Within,
    }
}

// ==========================================
// SchemeEligibilityScorer - 计划适配性评分器
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemeEligibilityScorer;

impl SchemeEligibilityScorer {
    pub fn new() -> Self {
        Self
    }

    /// 按计划条件评估项目
    ///
    /// # 参数
    /// - criteria: 计划条件
    /// - project_cost: 项目估算总额
    /// - state: 项目所在邦
    /// - categories: 项目涉及的成本类别
    pub fn evaluate(
        &self,
        criteria: &SchemeCriteria,
        project_cost: f64,
        state: &str,
        categories: &[CostCategory],
    ) -> SchemeEligibility {
        let regional_applicability = criteria.eligible_states.is_empty()
            || criteria
                .eligible_states
                .iter()
                .any(|s| s.eq_ignore_ascii_case(state));
        let sector_alignment = criteria.eligible_categories.is_empty()
            || categories
                .iter()
                .any(|c| criteria.eligible_categories.contains(c));

        SchemeEligibility {
            funding_alignment: classify_funding(
                project_cost,
                criteria.min_funding,
                criteria.max_funding,
            ),
            regional_applicability,
            sector_alignment,
        }
    }

    /// 适配置信度
    pub fn score(&self, eligibility: &SchemeEligibility) -> f64 {
        let funding = match eligibility.funding_alignment {
            FundingAlignment::Within => FUNDING_WEIGHT_WITHIN,
            FundingAlignment::Under => FUNDING_WEIGHT_UNDER,
            FundingAlignment::Over => FUNDING_WEIGHT_OVER,
            FundingAlignment::Unknown => FUNDING_WEIGHT_UNKNOWN,
        };
        let regional = if eligibility.regional_applicability {
            REGIONAL_WEIGHT
        } else {
            0.0
        };
        let sector = if eligibility.sector_alignment {
            SECTOR_WEIGHT
        } else {
            0.0
        };
        (funding + regional + sector).clamp(0.0, 1.0)
    }
}
