// ==========================================
// DPR 价格分析核心 - 领域类型定义
// ==========================================
// 职责: 成本类别、标记类型、因子来源等枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 成本类别 (Cost Category)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostCategory {
    Materials,    // 材料
    Labor,        // 人工
    Equipment,    // 机械设备
    Transport,    // 运输
    Construction, // 土建施工
}

impl CostCategory {
    /// 全部类别 (固定顺序, 批量计算按此顺序展开)
    pub const ALL: [CostCategory; 5] = [
        CostCategory::Materials,
        CostCategory::Labor,
        CostCategory::Equipment,
        CostCategory::Transport,
        CostCategory::Construction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CostCategory::Materials => "MATERIALS",
            CostCategory::Labor => "LABOR",
            CostCategory::Equipment => "EQUIPMENT",
            CostCategory::Transport => "TRANSPORT",
            CostCategory::Construction => "CONSTRUCTION",
        }
    }
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CostCategory {
    type Err = String;

    /// 解析类别字符串 (大小写不敏感, 兼容 LABOUR 拼写)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MATERIALS" | "MATERIAL" => Ok(CostCategory::Materials),
            "LABOR" | "LABOUR" => Ok(CostCategory::Labor),
            "EQUIPMENT" => Ok(CostCategory::Equipment),
            "TRANSPORT" => Ok(CostCategory::Transport),
            "CONSTRUCTION" => Ok(CostCategory::Construction),
            other => Err(format!("未知成本类别: {}", other)),
        }
    }
}

// ==========================================
// 价格标记类型 (Flag Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagType {
    Overpriced,  // 偏高
    Underpriced, // 偏低
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagType::Overpriced => write!(f, "OVERPRICED"),
            FlagType::Underpriced => write!(f, "UNDERPRICED"),
        }
    }
}

// ==========================================
// 价格分类 (Price Classification)
// ==========================================
// NORMAL 不进入 flagged_items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceClassification {
    Overpriced,
    Underpriced,
    Normal,
}

impl PriceClassification {
    /// 转换为标记类型 (NORMAL 无标记)
    pub fn flag_type(&self) -> Option<FlagType> {
        match self {
            PriceClassification::Overpriced => Some(FlagType::Overpriced),
            PriceClassification::Underpriced => Some(FlagType::Underpriced),
            PriceClassification::Normal => None,
        }
    }
}

impl fmt::Display for PriceClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceClassification::Overpriced => write!(f, "OVERPRICED"),
            PriceClassification::Underpriced => write!(f, "UNDERPRICED"),
            PriceClassification::Normal => write!(f, "NORMAL"),
        }
    }
}

// ==========================================
// 地区系数来源 (Regional Factor Source)
// ==========================================
// 顺序: District > State > Default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactorSource {
    District, // 区县级系数
    State,    // 邦级系数
    Default,  // 无记录, 中性系数 1.0
}

impl FactorSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, FactorSource::Default)
    }
}

impl fmt::Display for FactorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorSource::District => write!(f, "DISTRICT"),
            FactorSource::State => write!(f, "STATE"),
            FactorSource::Default => write!(f, "DEFAULT"),
        }
    }
}

// ==========================================
// 通胀系数来源 (Inflation Source)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InflationSource {
    Exact,        // 精确命中 inflation_factor 记录
    Approximated, // 按类别默认年增长率复利估算
}

impl InflationSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, InflationSource::Approximated)
    }
}

impl fmt::Display for InflationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InflationSource::Exact => write!(f, "EXACT"),
            InflationSource::Approximated => write!(f, "APPROXIMATED"),
        }
    }
}

// ==========================================
// 资金匹配度 (Funding Alignment)
// ==========================================
// 项目估算与计划资助区间的关系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FundingAlignment {
    Under,   // 低于资助下限
    Within,  // 区间内
    Over,    // 超过资助上限
    Unknown, // 区间未知
}

impl fmt::Display for FundingAlignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundingAlignment::Under => write!(f, "UNDER"),
            FundingAlignment::Within => write!(f, "WITHIN"),
            FundingAlignment::Over => write!(f, "OVER"),
            FundingAlignment::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_category_round_trip_through_str() {
        for category in CostCategory::ALL {
            let parsed: CostCategory = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert_eq!("labour".parse::<CostCategory>().unwrap(), CostCategory::Labor);
        assert!("SERVICES".parse::<CostCategory>().is_err());
    }

    #[test]
    fn test_cost_category_serde_format() {
        let json = serde_json::to_string(&CostCategory::Construction).unwrap();
        assert_eq!(json, "\"CONSTRUCTION\"");
    }

    #[test]
    fn test_classification_flag_type() {
        assert_eq!(
            PriceClassification::Overpriced.flag_type(),
            Some(FlagType::Overpriced)
        );
        assert_eq!(PriceClassification::Normal.flag_type(), None);
    }
}
