// ==========================================
// DPR 价格分析核心 - 价格基准计算引擎
// ==========================================
// 流程: 归一化 -> 描述分组 -> 离群剔除 -> 统计 -> upsert
// 依据: 按邦一次 + 按宏观区域汇总一次, 两类基准分别存储
// 红线: 样本不足不是错误, 只是不产出基准
// 红线: 单项归一化失败隔离, 不中断其余明细
// ==========================================

use crate::domain::{
    BenchmarkStatistics, CostCategory, HistoricalCostItem, ItemFailure, PriceBenchmark,
};
use crate::engine::cost_normalizer::{CostNormalizer, NormalizationTarget};
use crate::engine::error::{CostError, CostResult};
use crate::engine::item_grouper::{normalize_description, ItemGrouper};
use crate::engine::statistics;
use crate::repository::CostDataRepository;
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub const DEFAULT_MIN_SAMPLE_SIZE: usize = 5;
pub const DEFAULT_OUTLIER_Z_THRESHOLD: f64 = 2.0;
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// 默认宏观区域
pub const DEFAULT_MACRO_REGION_LABEL: &str = "North Eastern Region";
pub const NORTH_EASTERN_STATES: [&str; 8] = [
    "Assam",
    "Arunachal Pradesh",
    "Manipur",
    "Meghalaya",
    "Mizoram",
    "Nagaland",
    "Sikkim",
    "Tripura",
];

// ==========================================
// BenchmarkOptions - 基准计算参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkOptions {
    pub min_sample_size: usize,
    pub outlier_z_threshold: f64,
    pub confidence_level: f64,
    pub target_year: i32,
    pub include_outliers: bool,
    /// 地区系数生效判定日期
    pub as_of: NaiveDate,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        let today = Utc::now().date_naive();
        Self {
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
            outlier_z_threshold: DEFAULT_OUTLIER_Z_THRESHOLD,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            target_year: today.year(),
            include_outliers: false,
            as_of: today,
        }
    }
}

// ==========================================
// MacroRegion - 宏观区域
// ==========================================
/// 多个邦汇总而成的区域, 标签不与任何单个邦重名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroRegion {
    pub label: String,
    pub states: Vec<String>,
}

impl Default for MacroRegion {
    fn default() -> Self {
        Self::north_eastern()
    }
}

impl MacroRegion {
    pub fn new(label: &str, states: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            states: states.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn north_eastern() -> Self {
        Self::new(DEFAULT_MACRO_REGION_LABEL, &NORTH_EASTERN_STATES)
    }

    pub fn contains(&self, state: &str) -> bool {
        self.states.iter().any(|s| s.eq_ignore_ascii_case(state))
    }
}

// ==========================================
// 计算结果
// ==========================================

/// 单个基准及其审计信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedBenchmark {
    pub benchmark: PriceBenchmark,
    pub statistics: BenchmarkStatistics,
    /// 被剔除的离群单价 (仅审计, 不计入 sample_size)
    pub removed_outliers: Vec<f64>,
    /// 分组原始成员数 (剔除前)
    pub group_size: usize,
}

/// 未产出基准的分组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedGroup {
    pub category: CostCategory,
    pub description: String,
    pub group_size: usize,
    pub reason: String,
}

/// 一次 (类别, 地区) 计算的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkBatchResult {
    pub region: String,
    pub benchmarks: Vec<CalculatedBenchmark>,
    pub skipped_groups: Vec<SkippedGroup>,
    /// 归一化失败的明细
    pub failures: Vec<ItemFailure>,
    /// 基准写入失败 (不中断其余基准)
    pub persist_errors: Vec<String>,
}

impl BenchmarkBatchResult {
    fn empty(region: &str) -> Self {
        Self {
            region: region.to_string(),
            ..Default::default()
        }
    }
}

/// 已归一化的历史明细
struct Sample<'a> {
    item: &'a HistoricalCostItem,
    rate: f64,
}

// ==========================================
// BenchmarkCalculator - 价格基准计算引擎
// ==========================================
pub struct BenchmarkCalculator<R>
where
    R: CostDataRepository + ?Sized,
{
    repo: Arc<R>,
    normalizer: Arc<CostNormalizer<R>>,
    grouper: ItemGrouper,
}

impl<R> BenchmarkCalculator<R>
where
    R: CostDataRepository + ?Sized,
{
    pub fn new(repo: Arc<R>, normalizer: Arc<CostNormalizer<R>>) -> Self {
        Self {
            repo,
            normalizer,
            grouper: ItemGrouper::new(),
        }
    }

    pub fn with_grouper(mut self, grouper: ItemGrouper) -> Self {
        self.grouper = grouper;
        self
    }

    // ==========================================
    // 纯计算
    // ==========================================

    /// 计算基准 (不写仓储)
    ///
    /// # 参数
    /// - items: 历史明细 (可混合多个类别)
    /// - region: 归一化目标地区, 同时作为基准的 region 标签
    /// - options: 计算参数
    #[instrument(skip(self, items, options), fields(items = items.len()))]
    pub fn calculate(
        &self,
        items: &[HistoricalCostItem],
        region: &str,
        options: &BenchmarkOptions,
    ) -> BenchmarkBatchResult {
        let mut result = BenchmarkBatchResult::empty(region);

        if items.len() < options.min_sample_size {
            debug!(
                region,
                total = items.len(),
                required = options.min_sample_size,
                "历史明细总量不足, 不产出基准"
            );
            return result;
        }

        let target = NormalizationTarget::new(options.target_year, region).as_of(options.as_of);
        let batch = self.normalizer.normalize_batch(items, &target);
        let rates: HashMap<&str, f64> = batch
            .successes
            .iter()
            .map(|n| (n.item_id.as_str(), n.normalized_unit_rate))
            .collect();
        result.failures = batch.failures;

        let samples: Vec<Sample<'_>> = items
            .iter()
            .filter_map(|item| {
                rates
                    .get(item.id.as_str())
                    .map(|rate| Sample { item, rate: *rate })
            })
            .collect();

        for category in CostCategory::ALL {
            let in_category: Vec<&Sample<'_>> =
                samples.iter().filter(|s| s.item.category == category).collect();
            if in_category.is_empty() {
                continue;
            }

            let groups = self
                .grouper
                .group(&in_category, |s| s.item.description.as_str());
            for group in groups {
                match summarize_group(
                    category,
                    &group.canonical_description,
                    &group.items,
                    region,
                    options,
                ) {
                    Ok(calculated) => result.benchmarks.push(calculated),
                    Err(skipped) => {
                        debug!(
                            %category,
                            description = %skipped.description,
                            reason = %skipped.reason,
                            "分组未产出基准"
                        );
                        result.skipped_groups.push(skipped);
                    }
                }
            }
        }

        result
    }

    // ==========================================
    // 计算 + 持久化
    // ==========================================

    /// 计算并写入单个邦、单个类别的基准
    #[instrument(skip(self, options))]
    pub fn calculate_category_benchmarks(
        &self,
        category: CostCategory,
        state: &str,
        options: &BenchmarkOptions,
    ) -> CostResult<BenchmarkBatchResult> {
        let items = self
            .repo
            .get_historical_cost_items_by_category(category, Some(state))?;
        let mut result = self.calculate(&items, state, options);
        self.persist(&mut result);

        info!(
            %category,
            state,
            benchmarks = result.benchmarks.len(),
            skipped = result.skipped_groups.len(),
            "邦级基准计算完成"
        );
        Ok(result)
    }

    /// 汇总宏观区域内全部邦的明细, 计算并写入宏观区域基准
    #[instrument(skip(self, macro_region, options), fields(region = %macro_region.label))]
    pub fn calculate_macro_region_benchmarks(
        &self,
        category: CostCategory,
        macro_region: &MacroRegion,
        options: &BenchmarkOptions,
    ) -> CostResult<BenchmarkBatchResult> {
        let items: Vec<HistoricalCostItem> = self
            .repo
            .get_historical_cost_items_by_category(category, None)?
            .into_iter()
            .filter(|item| macro_region.contains(&item.state))
            .collect();
        let mut result = self.calculate(&items, &macro_region.label, options);
        self.persist(&mut result);

        info!(
            %category,
            pooled = items.len(),
            benchmarks = result.benchmarks.len(),
            "宏观区域基准计算完成"
        );
        Ok(result)
    }

    /// 针对单条描述临时计算基准并写入
    ///
    /// 基准键使用提交描述的归一化文本, 重复调用只覆盖同一条记录
    ///
    /// # 返回
    /// - Ok(None): 相似历史明细不足
    #[instrument(skip(self, options))]
    pub fn calculate_for_description(
        &self,
        category: CostCategory,
        description: &str,
        state: &str,
        options: &BenchmarkOptions,
    ) -> CostResult<Option<CalculatedBenchmark>> {
        let similar: Vec<HistoricalCostItem> = self
            .repo
            .get_historical_cost_items_by_category(category, Some(state))?
            .into_iter()
            .filter(|item| self.grouper.is_similar(&item.description, description))
            .collect();

        if similar.len() < options.min_sample_size {
            debug!(
                found = similar.len(),
                required = options.min_sample_size,
                "相似历史明细不足, 无法临时计算基准"
            );
            return Ok(None);
        }

        let target = NormalizationTarget::new(options.target_year, state).as_of(options.as_of);
        let batch = self.normalizer.normalize_batch(&similar, &target);
        let rates: HashMap<&str, f64> = batch
            .successes
            .iter()
            .map(|n| (n.item_id.as_str(), n.normalized_unit_rate))
            .collect();
        let samples: Vec<Sample<'_>> = similar
            .iter()
            .filter_map(|item| {
                rates
                    .get(item.id.as_str())
                    .map(|rate| Sample { item, rate: *rate })
            })
            .collect();
        let members: Vec<&Sample<'_>> = samples.iter().collect();

        let canonical = normalize_description(description);
        match summarize_group(category, &canonical, &members, state, options) {
            Ok(mut calculated) => {
                calculated.benchmark = self
                    .repo
                    .create_or_update_price_benchmark(&calculated.benchmark)?;
                info!(
                    key = %calculated.benchmark.key(),
                    sample_size = calculated.benchmark.sample_size,
                    "已临时生成价格基准"
                );
                Ok(Some(calculated))
            }
            Err(skipped) => {
                debug!(reason = %skipped.reason, "临时基准未产出");
                Ok(None)
            }
        }
    }

    /// 逐条 upsert, 写入失败记录后继续
    fn persist(&self, result: &mut BenchmarkBatchResult) {
        for calculated in &mut result.benchmarks {
            match self
                .repo
                .create_or_update_price_benchmark(&calculated.benchmark)
            {
                Ok(stored) => calculated.benchmark = stored,
                Err(e) => {
                    warn!(key = %calculated.benchmark.key(), error = %e, "基准写入失败");
                    result
                        .persist_errors
                        .push(format!("{}: {}", calculated.benchmark.key(), e));
                }
            }
        }
    }
}

/// 分组统计 -> 基准
///
/// 剔除离群值后保留数不足 min_sample_size 时不产出
fn summarize_group(
    category: CostCategory,
    canonical: &str,
    members: &[&Sample<'_>],
    region: &str,
    options: &BenchmarkOptions,
) -> Result<CalculatedBenchmark, SkippedGroup> {
    let group_size = members.len();
    let skipped = |reason: String| SkippedGroup {
        category,
        description: canonical.to_string(),
        group_size,
        reason,
    };
    let insufficient = |actual: usize| CostError::InsufficientSample {
        key: format!("{}/{}/{}", category, canonical, region),
        required: options.min_sample_size,
        actual,
    };

    if group_size < options.min_sample_size {
        return Err(skipped(insufficient(group_size).to_string()));
    }

    let rates: Vec<f64> = members.iter().map(|s| s.rate).collect();
    let (kept, removed) = if options.include_outliers {
        (rates, Vec::new())
    } else {
        statistics::remove_outliers(&rates, options.outlier_z_threshold)
    };

    if !removed.is_empty() {
        debug!(description = canonical, removed = ?removed, "已剔除离群单价");
    }
    if kept.len() < options.min_sample_size {
        return Err(skipped(format!(
            "剔除 {} 个离群值后{}",
            removed.len(),
            insufficient(kept.len())
        )));
    }

    let stats = match statistics::describe(&kept, options.confidence_level) {
        Some(stats) => stats,
        None => return Err(skipped("无有效单价".to_string())),
    };

    let unit = most_frequent_unit(members.iter().map(|s| s.item.unit.as_deref()));
    let benchmark = PriceBenchmark {
        id: Uuid::new_v4().to_string(),
        item_category: category,
        item_description: canonical.to_string(),
        unit,
        region: region.to_string(),
        average_unit_rate: stats.mean,
        median_unit_rate: stats.median,
        min_unit_rate: stats.min,
        max_unit_rate: stats.max,
        standard_deviation: stats.std_dev,
        sample_size: stats.count,
        last_updated: Utc::now(),
        base_year: options.target_year,
    };

    Ok(CalculatedBenchmark {
        benchmark,
        statistics: stats,
        removed_outliers: removed,
        group_size,
    })
}

/// 出现次数最多的单位 (并列时取最先出现者, 忽略缺失)
pub fn most_frequent_unit<'a>(units: impl Iterator<Item = Option<&'a str>>) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for unit in units.flatten() {
        match counts.iter_mut().find(|(u, _)| *u == unit) {
            Some((_, count)) => *count += 1,
            None => counts.push((unit, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (unit, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((unit, count));
        }
    }
    best.map(|(unit, _)| unit.to_string())
}
