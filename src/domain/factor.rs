// ==========================================
// DPR 价格分析核心 - 参考系数实体
// ==========================================
// 职责: 地区成本系数 / 通胀系数
// 约束: 同一 (state, district, category) 的生效区间不得重叠
// 约束: year == base_year 时 cumulative_factor 必须为 1.0
// ==========================================

use crate::domain::types::CostCategory;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// cumulative_factor 与 1.0 比较时的容差
pub const FACTOR_EPSILON: f64 = 1e-9;

// ==========================================
// RegionalCostFactor - 地区成本系数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalCostFactor {
    pub state: String,
    pub district: Option<String>,
    pub category: CostCategory,
    pub factor: f64,
    pub base_year: i32,
    pub effective_from: NaiveDate,
    /// 为空表示长期有效
    pub effective_to: Option<NaiveDate>,
}

impl RegionalCostFactor {
    /// 是否与另一条记录属于同一作用域 (state + district + category)
    pub fn same_scope(&self, other: &RegionalCostFactor) -> bool {
        self.state.eq_ignore_ascii_case(&other.state)
            && match (&self.district, &other.district) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                (None, None) => true,
                _ => false,
            }
            && self.category == other.category
    }

    /// 指定日期是否在生效区间内 (两端闭区间)
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.map_or(true, |to| date <= to)
    }

    /// 生效区间是否与另一条记录重叠 (不检查作用域)
    pub fn overlaps(&self, other: &RegionalCostFactor) -> bool {
        let self_ends_before_other = self
            .effective_to
            .map_or(false, |to| to < other.effective_from);
        let other_ends_before_self = other
            .effective_to
            .map_or(false, |to| to < self.effective_from);
        !(self_ends_before_other || other_ends_before_self)
    }

    /// 系数与区间的基本校验
    pub fn validate(&self) -> Result<(), String> {
        if !self.factor.is_finite() || self.factor <= 0.0 {
            return Err(format!("地区系数必须为正数: {}", self.factor));
        }
        if let Some(to) = self.effective_to {
            if to < self.effective_from {
                return Err(format!(
                    "生效区间无效: effective_from={} > effective_to={}",
                    self.effective_from, to
                ));
            }
        }
        Ok(())
    }
}

// ==========================================
// InflationFactor - 通胀系数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InflationFactor {
    pub year: i32,
    pub category: CostCategory,
    /// 年增长率 (0.06 = 6%)
    pub inflation_rate: f64,
    /// 相对 base_year 的累计系数
    pub cumulative_factor: f64,
    pub base_year: i32,
}

impl InflationFactor {
    /// 基准年记录 (累计系数恒为 1.0)
    pub fn base(category: CostCategory, base_year: i32, inflation_rate: f64) -> Self {
        Self {
            year: base_year,
            category,
            inflation_rate,
            cumulative_factor: 1.0,
            base_year,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.cumulative_factor.is_finite() || self.cumulative_factor <= 0.0 {
            return Err(format!("累计通胀系数必须为正数: {}", self.cumulative_factor));
        }
        if self.year == self.base_year && (self.cumulative_factor - 1.0).abs() > FACTOR_EPSILON {
            return Err(format!(
                "基准年 {} 的累计通胀系数必须为 1.0, 实际 {}",
                self.base_year, self.cumulative_factor
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor(from: (i32, u32, u32), to: Option<(i32, u32, u32)>) -> RegionalCostFactor {
        RegionalCostFactor {
            state: "Assam".to_string(),
            district: None,
            category: CostCategory::Materials,
            factor: 1.15,
            base_year: 2020,
            effective_from: NaiveDate::from_ymd_opt(from.0, from.1, from.2).unwrap(),
            effective_to: to.map(|t| NaiveDate::from_ymd_opt(t.0, t.1, t.2).unwrap()),
        }
    }

    #[test]
    fn test_overlap_detection() {
        let a = factor((2020, 1, 1), Some((2022, 12, 31)));
        let b = factor((2023, 1, 1), None);
        let c = factor((2022, 6, 1), None);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn test_open_ended_is_effective() {
        let f = factor((2020, 1, 1), None);
        assert!(f.is_effective_on(NaiveDate::from_ymd_opt(2035, 1, 1).unwrap()));
        assert!(!f.is_effective_on(NaiveDate::from_ymd_opt(2019, 12, 31).unwrap()));
    }

    #[test]
    fn test_scope_distinguishes_district() {
        let a = factor((2020, 1, 1), None);
        let mut b = a.clone();
        b.district = Some("Kamrup".to_string());
        assert!(!a.same_scope(&b));
    }

    #[test]
    fn test_base_year_invariant() {
        let mut f = InflationFactor::base(CostCategory::Labor, 2020, 0.08);
        assert!(f.validate().is_ok());
        f.cumulative_factor = 1.08;
        assert!(f.validate().is_err());
    }
}
