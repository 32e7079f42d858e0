// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

use chrono::NaiveDate;
use dpr_price_analyzer::domain::{
    CostCategory, DprCostItem, HistoricalCostItem, InflationFactor, PriceBenchmark,
    RegionalCostFactor,
};
use dpr_price_analyzer::engine::item_grouper::normalize_description;
use uuid::Uuid;

// ==========================================
// HistoricalCostItem 构建器
// ==========================================

pub struct HistoricalItemBuilder {
    id: Option<String>,
    project_id: String,
    category: CostCategory,
    description: String,
    unit: Option<String>,
    quantity: Option<f64>,
    unit_rate: f64,
    state: String,
    district: Option<String>,
}

impl HistoricalItemBuilder {
    pub fn new(category: CostCategory, description: &str, unit_rate: f64) -> Self {
        Self {
            id: None,
            project_id: "HIST-P001".to_string(),
            category,
            description: description.to_string(),
            unit: None,
            quantity: None,
            unit_rate,
            state: "Assam".to_string(),
            district: None,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn project(mut self, project_id: &str) -> Self {
        self.project_id = project_id.to_string();
        self
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn state(mut self, state: &str) -> Self {
        self.state = state.to_string();
        self
    }

    pub fn district(mut self, district: &str) -> Self {
        self.district = Some(district.to_string());
        self
    }

    pub fn build(self) -> HistoricalCostItem {
        let mut item = HistoricalCostItem::new(
            &self.project_id,
            self.category,
            &self.description,
            self.unit_rate,
            &self.state,
        );
        if let Some(id) = &self.id {
            item = item.with_id(id);
        }
        if let Some(unit) = &self.unit {
            item = item.with_unit(unit);
        }
        if let Some(quantity) = self.quantity {
            item = item.with_quantity(quantity);
        }
        if let Some(district) = &self.district {
            item = item.with_district(district);
        }
        item
    }
}

/// 同一描述、同一邦的一组历史明细
pub fn historical_series(
    category: CostCategory,
    description: &str,
    state: &str,
    rates: &[f64],
) -> Vec<HistoricalCostItem> {
    rates
        .iter()
        .enumerate()
        .map(|(i, rate)| {
            HistoricalItemBuilder::new(category, description, *rate)
                .project(&format!("HIST-{}-{:03}", state.to_ascii_uppercase(), i + 1))
                .state(state)
                .build()
        })
        .collect()
}

// ==========================================
// 参考系数
// ==========================================

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("invalid test date")
}

/// 邦级地区系数 (2020-01-01 起长期有效)
pub fn state_factor(state: &str, category: CostCategory, factor: f64) -> RegionalCostFactor {
    RegionalCostFactor {
        state: state.to_string(),
        district: None,
        category,
        factor,
        base_year: 2020,
        effective_from: date(2020, 1, 1),
        effective_to: None,
    }
}

/// 区县级地区系数 (2020-01-01 起长期有效)
pub fn district_factor(
    state: &str,
    district: &str,
    category: CostCategory,
    factor: f64,
) -> RegionalCostFactor {
    RegionalCostFactor {
        district: Some(district.to_string()),
        ..state_factor(state, category, factor)
    }
}

/// 以 2020 为基准年的通胀系数
pub fn inflation(year: i32, category: CostCategory, cumulative_factor: f64) -> InflationFactor {
    InflationFactor {
        year,
        category,
        inflation_rate: 0.0,
        cumulative_factor,
        base_year: 2020,
    }
}

// ==========================================
// PriceBenchmark / DprCostItem
// ==========================================

/// 描述按基准键口径归一化后写入
pub fn benchmark(
    category: CostCategory,
    description: &str,
    region: &str,
    average: f64,
    std_dev: f64,
    sample_size: usize,
    base_year: i32,
) -> PriceBenchmark {
    PriceBenchmark {
        id: Uuid::new_v4().to_string(),
        item_category: category,
        item_description: normalize_description(description),
        unit: None,
        region: region.to_string(),
        average_unit_rate: average,
        median_unit_rate: average,
        min_unit_rate: average - 2.0 * std_dev,
        max_unit_rate: average + 2.0 * std_dev,
        standard_deviation: std_dev,
        sample_size,
        last_updated: chrono::Utc::now(),
        base_year,
    }
}

pub fn dpr_item(category: CostCategory, description: &str, quantity: f64, unit_rate: f64) -> DprCostItem {
    DprCostItem::new(category, description, None, quantity, unit_rate)
}
