// ==========================================
// DPR 价格分析核心 - 价格比对 / 异常识别引擎
// ==========================================
// 流程: 逐项解析基准 (邦级 -> 宏观区域 -> 临时计算)
//       -> 基准投影到目标年/目标邦 -> 偏差 + z 分数 + 置信度 -> 分类
// 红线: 偏差阈值为严格大于 (等于阈值不标记)
// 红线: 无基准明细计入 total_estimate, 不计入 regional_average
// 红线: 单项输入异常隔离, 其余明细继续比对
// ==========================================

use crate::domain::{
    CostCategory, DprCostItem, FlagType, ItemComparison, ItemFailure, PriceBenchmark,
    PriceClassification, PriceComparisonResult, PriceFlaggedItem, SchemeEligibility, SkippedItem,
};
use crate::engine::benchmark_calculator::{
    BenchmarkCalculator, BenchmarkOptions, MacroRegion, DEFAULT_CONFIDENCE_LEVEL,
    DEFAULT_MIN_SAMPLE_SIZE, DEFAULT_OUTLIER_Z_THRESHOLD,
};
use crate::engine::cost_normalizer::{CostNormalizer, NormalizationTarget};
use crate::engine::error::{CostError, CostResult};
use crate::engine::item_grouper::normalize_description;
use crate::engine::scheme_eligibility::SchemeEligibilityScorer;
use crate::engine::statistics;
use crate::repository::CostDataRepository;
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_DEVIATION_THRESHOLD: f64 = 0.20;

/// 标记所需的最低置信度 (严格大于)
pub const FLAG_CONFIDENCE_THRESHOLD: f64 = 0.7;

// ==========================================
// ComparisonOptions - 比对参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonOptions {
    pub deviation_threshold: f64,
    pub confidence_level: f64,
    pub min_sample_size: usize,
    pub target_year: i32,
    pub target_state: String,
    pub target_district: Option<String>,
    pub as_of: NaiveDate,
    /// 邦级基准缺失时使用的宏观区域
    pub macro_region: MacroRegion,
    /// 无存量基准时是否临时计算
    pub allow_ad_hoc_benchmarks: bool,
    /// 临时计算基准时的离群阈值
    pub outlier_z_threshold: f64,
    pub scheme_eligibility: Option<SchemeEligibility>,
}

impl ComparisonOptions {
    pub fn new(target_year: i32, target_state: &str) -> Self {
        Self {
            deviation_threshold: DEFAULT_DEVIATION_THRESHOLD,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
            target_year,
            target_state: target_state.to_string(),
            target_district: None,
            as_of: Utc::now().date_naive(),
            macro_region: MacroRegion::default(),
            allow_ad_hoc_benchmarks: true,
            outlier_z_threshold: DEFAULT_OUTLIER_Z_THRESHOLD,
            scheme_eligibility: None,
        }
    }

    /// 当前年份 + 指定邦
    pub fn for_state(target_state: &str) -> Self {
        Self::new(Utc::now().year(), target_state)
    }

    pub fn with_district(mut self, district: Option<&str>) -> Self {
        self.target_district = district.map(|d| d.to_string());
        self
    }

    pub fn normalization_target(&self) -> NormalizationTarget {
        NormalizationTarget::new(self.target_year, &self.target_state)
            .with_district(self.target_district.as_deref())
            .as_of(self.as_of)
    }

    /// 临时计算基准所用参数
    pub fn benchmark_options(&self) -> BenchmarkOptions {
        BenchmarkOptions {
            min_sample_size: self.min_sample_size,
            outlier_z_threshold: self.outlier_z_threshold,
            confidence_level: self.confidence_level,
            target_year: self.target_year,
            include_outliers: false,
            as_of: self.as_of,
        }
    }
}

// ==========================================
// 纯函数: 置信度 / 分类 / 建议文本
// ==========================================

/// 置信度 0.6 * min(n / min_n, 1) + 0.4 * min(|z| / 2, 1), 截断到 [0, 1]
pub fn confidence_score(sample_size: usize, min_sample_size: usize, z_score: f64) -> f64 {
    let sample_part = if min_sample_size == 0 {
        1.0
    } else {
        (sample_size as f64 / min_sample_size as f64).min(1.0)
    };
    let z_part = (z_score.abs() / 2.0).min(1.0);
    (0.6 * sample_part + 0.4 * z_part).clamp(0.0, 1.0)
}

/// 偏差与置信度 -> 分类
///
/// 两个条件都严格大于阈值才标记
pub fn classify(
    deviation_percentage: f64,
    confidence: f64,
    deviation_threshold: f64,
) -> PriceClassification {
    if deviation_percentage.abs() > deviation_threshold * 100.0
        && confidence > FLAG_CONFIDENCE_THRESHOLD
    {
        if deviation_percentage > 0.0 {
            PriceClassification::Overpriced
        } else {
            PriceClassification::Underpriced
        }
    } else {
        PriceClassification::Normal
    }
}

/// 标记项建议文本 (按偏差幅度分档)
pub fn recommendation_for(
    flag_type: FlagType,
    deviation_percentage: f64,
    confidence: f64,
    sample_size: usize,
) -> String {
    let magnitude = deviation_percentage.abs();
    let qualifier = if confidence >= 0.9 { "high" } else { "moderate" };
    let basis = format!("{} confidence, {} historical samples", qualifier, sample_size);

    match flag_type {
        FlagType::Overpriced => {
            if magnitude > 50.0 {
                format!(
                    "Critical overpricing: rate is {:.1}% above benchmark ({}). Reject the rate or require detailed justification with supplier quotations.",
                    magnitude, basis
                )
            } else if magnitude > 30.0 {
                format!(
                    "Significant overpricing: rate is {:.1}% above benchmark ({}). Request a rate analysis and market survey before approval.",
                    magnitude, basis
                )
            } else {
                format!(
                    "Moderate overpricing: rate is {:.1}% above benchmark ({}). Verify against the current schedule of rates.",
                    magnitude, basis
                )
            }
        }
        FlagType::Underpriced => {
            if magnitude > 50.0 {
                format!(
                    "Critical underpricing: rate is {:.1}% below benchmark ({}). Check for omitted scope or unrealistic assumptions; execution risk is high.",
                    magnitude, basis
                )
            } else if magnitude > 30.0 {
                format!(
                    "Significant underpricing: rate is {:.1}% below benchmark ({}). Confirm specifications and quantities match the benchmark items.",
                    magnitude, basis
                )
            } else {
                format!(
                    "Moderate underpricing: rate is {:.1}% below benchmark ({}). Confirm the rate is sustainable for the contract duration.",
                    magnitude, basis
                )
            }
        }
    }
}

/// 无基准明细的建议文本
pub fn no_benchmark_recommendation(category: CostCategory, description: &str) -> String {
    format!(
        "No benchmark available for '{}' ({}); manual rate verification required.",
        description, category
    )
}

/// 项目级汇总建议 (按总体偏差分档)
pub fn summary_recommendation(
    compared: usize,
    overall_deviation: f64,
    deviation_threshold: f64,
) -> String {
    if compared == 0 {
        return "No submitted item could be compared against a benchmark; the whole estimate requires manual review.".to_string();
    }
    let threshold = deviation_threshold * 100.0;
    if overall_deviation > threshold {
        format!(
            "Overall estimate is {:.1}% above regional benchmarks (threshold {:.0}%); revise the estimate before sanction.",
            overall_deviation, threshold
        )
    } else if overall_deviation < -threshold {
        format!(
            "Overall estimate is {:.1}% below regional benchmarks (threshold {:.0}%); review scope completeness before sanction.",
            overall_deviation.abs(),
            threshold
        )
    } else {
        format!(
            "Overall estimate is within {:.0}% of regional benchmarks ({:+.1}%).",
            threshold, overall_deviation
        )
    }
}

/// DPR 明细输入校验
fn validate_dpr_item(item_id: &str, item: &DprCostItem) -> CostResult<()> {
    if !item.unit_rate.is_finite() || item.unit_rate <= 0.0 {
        return Err(CostError::malformed(
            item_id,
            "unit_rate",
            format!("单价必须为正数, 实际 {}", item.unit_rate),
        ));
    }
    if !item.quantity.is_finite() || item.quantity <= 0.0 {
        return Err(CostError::malformed(
            item_id,
            "quantity",
            format!("数量必须为正数, 实际 {}", item.quantity),
        ));
    }
    Ok(())
}

// ==========================================
// PriceComparator - 价格比对引擎
// ==========================================
pub struct PriceComparator<R>
where
    R: CostDataRepository + ?Sized,
{
    repo: Arc<R>,
    normalizer: Arc<CostNormalizer<R>>,
    calculator: BenchmarkCalculator<R>,
    scorer: SchemeEligibilityScorer,
}

impl<R> PriceComparator<R>
where
    R: CostDataRepository + ?Sized,
{
    /// 创建新的 PriceComparator 实例
    ///
    /// # 参数
    /// - repo: 成本数据仓储
    /// - normalizer: 与基准计算共用的归一化引擎
    pub fn new(repo: Arc<R>, normalizer: Arc<CostNormalizer<R>>) -> Self {
        let calculator = BenchmarkCalculator::new(repo.clone(), normalizer.clone());
        Self {
            repo,
            normalizer,
            calculator,
            scorer: SchemeEligibilityScorer::new(),
        }
    }

    /// 解析单项基准: 邦级 -> 宏观区域 -> 临时计算
    pub fn resolve_benchmark(
        &self,
        item: &DprCostItem,
        options: &ComparisonOptions,
    ) -> CostResult<Option<PriceBenchmark>> {
        let description = normalize_description(&item.description);
        let unit = item.unit.as_deref();

        if let Some(benchmark) = self.repo.get_price_benchmark(
            item.category,
            &description,
            &options.target_state,
            unit,
        )? {
            return Ok(Some(benchmark));
        }

        if let Some(benchmark) = self.repo.get_price_benchmark(
            item.category,
            &description,
            &options.macro_region.label,
            unit,
        )? {
            debug!(description = %description, region = %options.macro_region.label, "使用宏观区域基准");
            return Ok(Some(benchmark));
        }

        if !options.allow_ad_hoc_benchmarks {
            return Ok(None);
        }

        // 同键已有基准 (仅单位不兼容) 时不临时计算, 避免覆盖已存记录
        if let Some(existing) = self.repo.get_price_benchmark(
            item.category,
            &description,
            &options.target_state,
            None,
        )? {
            debug!(
                key = %existing.key(),
                stored_unit = ?existing.unit,
                submitted_unit = ?unit,
                "已存基准单位不兼容, 跳过临时计算"
            );
            return Ok(None);
        }

        let calculated = self.calculator.calculate_for_description(
            item.category,
            &item.description,
            &options.target_state,
            &options.benchmark_options(),
        )?;
        Ok(calculated
            .map(|c| c.benchmark)
            .filter(|b| b.accepts_unit(unit)))
    }

    /// 比对 DPR 明细
    ///
    /// # 参数
    /// - project_id: 项目标识
    /// - items: DPR 提交明细 (顺序即 item_index)
    /// - options: 比对参数
    ///
    /// # 返回
    /// 项目级比对结果; 单项异常记录在 item_errors, 不中断比对
    #[instrument(skip(self, items, options), fields(items = items.len(), state = %options.target_state))]
    pub fn compare(
        &self,
        project_id: &str,
        items: &[DprCostItem],
        options: &ComparisonOptions,
    ) -> PriceComparisonResult {
        let target = options.normalization_target();
        let z_critical = statistics::z_value_for(options.confidence_level);

        let mut total_estimate = 0.0;
        let mut compared_dpr_total = 0.0;
        let mut regional_average = 0.0;
        let mut flagged_items = Vec::new();
        let mut recommendations = Vec::new();
        let mut compared_items = Vec::new();
        let mut skipped_items = Vec::new();
        let mut item_errors = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let item_id = format!("{}#{}", project_id, index);
            if let Err(e) = validate_dpr_item(&item_id, item) {
                warn!(item_id = %item_id, error = %e, "DPR 明细输入异常, 已隔离");
                item_errors.push(ItemFailure {
                    item_id,
                    description: item.description.clone(),
                    error: e.to_string(),
                    fallback: None,
                });
                continue;
            }

            let dpr_total = if item.total_cost.is_finite() && item.total_cost > 0.0 {
                item.total_cost
            } else {
                item.unit_rate * item.quantity
            };
            total_estimate += dpr_total;

            let benchmark = match self.resolve_benchmark(item, options) {
                Ok(Some(benchmark)) => benchmark,
                Ok(None) => {
                    let reason = CostError::NoBenchmarkAvailable(format!(
                        "{}/{}",
                        item.category, item.description
                    ));
                    debug!(item_id = %item_id, "{}", reason);
                    recommendations.push(no_benchmark_recommendation(
                        item.category,
                        &item.description,
                    ));
                    skipped_items.push(SkippedItem {
                        item_index: index,
                        item_category: item.category,
                        item_description: item.description.clone(),
                        reason: reason.to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    warn!(item_id = %item_id, error = %e, "基准解析失败, 按无基准处理");
                    recommendations.push(no_benchmark_recommendation(
                        item.category,
                        &item.description,
                    ));
                    skipped_items.push(SkippedItem {
                        item_index: index,
                        item_category: item.category,
                        item_description: item.description.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let projection = self.normalizer.project_benchmark(&benchmark, &target);
            let benchmark_rate = projection.normalized_unit_rate;
            if !benchmark_rate.is_finite() || benchmark_rate <= 0.0 {
                warn!(item_id = %item_id, benchmark_rate, "基准单价无效, 按无基准处理");
                recommendations.push(no_benchmark_recommendation(item.category, &item.description));
                skipped_items.push(SkippedItem {
                    item_index: index,
                    item_category: item.category,
                    item_description: item.description.clone(),
                    reason: format!("基准单价无效: {}", benchmark_rate),
                });
                continue;
            }
            let benchmark_std_dev = benchmark.standard_deviation * projection.scale;

            let deviation_percentage = (item.unit_rate - benchmark_rate) / benchmark_rate * 100.0;
            let z_score = if benchmark_std_dev > 0.0 {
                (item.unit_rate - benchmark_rate) / benchmark_std_dev
            } else {
                0.0
            };
            let confidence =
                confidence_score(benchmark.sample_size, options.min_sample_size, z_score);
            let classification =
                classify(deviation_percentage, confidence, options.deviation_threshold);

            let benchmark_implied_total = benchmark_rate * item.quantity;
            regional_average += benchmark_implied_total;
            compared_dpr_total += dpr_total;

            if let Some(flag_type) = classification.flag_type() {
                let recommendation = recommendation_for(
                    flag_type,
                    deviation_percentage,
                    confidence,
                    benchmark.sample_size,
                );
                recommendations.push(recommendation.clone());
                flagged_items.push(PriceFlaggedItem {
                    item_category: item.category,
                    item_description: item.description.clone(),
                    dpr_unit_rate: item.unit_rate,
                    benchmark_unit_rate: benchmark_rate,
                    deviation_percentage,
                    flag_type,
                    confidence,
                    recommendation,
                });
            }

            compared_items.push(ItemComparison {
                item_index: index,
                item_category: item.category,
                item_description: item.description.clone(),
                unit: item.unit.clone(),
                quantity: item.quantity,
                dpr_unit_rate: item.unit_rate,
                dpr_total_cost: dpr_total,
                benchmark_region: benchmark.region.clone(),
                benchmark_unit_rate: benchmark_rate,
                benchmark_implied_total,
                deviation_percentage,
                z_score,
                statistically_significant: z_score.abs() > z_critical,
                confidence,
                sample_size: benchmark.sample_size,
                classification,
            });
        }

        let deviation_percentage = if regional_average > 0.0 {
            (compared_dpr_total - regional_average) / regional_average * 100.0
        } else {
            0.0
        };
        recommendations.push(summary_recommendation(
            compared_items.len(),
            deviation_percentage,
            options.deviation_threshold,
        ));

        let scheme_confidence = options
            .scheme_eligibility
            .as_ref()
            .map(|e| self.scorer.score(e));

        info!(
            project_id,
            compared = compared_items.len(),
            flagged = flagged_items.len(),
            skipped = skipped_items.len(),
            errors = item_errors.len(),
            deviation = deviation_percentage,
            "DPR 价格比对完成"
        );

        PriceComparisonResult {
            project_id: project_id.to_string(),
            total_estimate,
            regional_average,
            deviation_percentage,
            flagged_items,
            recommendations,
            analysis_timestamp: Utc::now(),
            compared_items,
            skipped_items,
            item_errors,
            scheme_confidence,
        }
    }
}
