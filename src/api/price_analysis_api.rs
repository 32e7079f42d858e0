// ==========================================
// DPR 价格分析核心 - 价格分析 API
// ==========================================
// 职责: 面向报表/界面层的调用入口
// 流程: 读取配置 -> 构造显式参数 -> 引擎计算 (阻塞任务池)
// 并发: 每个 (类别, 地区) 一个独立任务, 单个任务失败不影响其余任务
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{AnalysisConfigReader, AnalysisSettings};
use crate::domain::{
    CostCategory, DprCostItem, ItemFailure, PriceComparisonResult, SchemeEligibility,
};
use crate::engine::{
    reference_data, BenchmarkBatchResult, BenchmarkCalculator, CostNormalizer, MacroRegion,
    NormalizationBatch, NormalizationTarget, PriceComparator,
};
use crate::importer::{HistoricalCsvImporter, ImportReport};
use crate::repository::CostDataRepository;
use chrono::{Datelike, NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{info, instrument, warn};

// ==========================================
// 请求 / 响应结构
// ==========================================

/// 全量基准计算请求
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRunRequest {
    /// 默认当前年份
    pub target_year: Option<i32>,
    /// 默认今天
    pub as_of: Option<NaiveDate>,
    /// 默认配置中的 benchmark_states
    pub states: Option<Vec<String>>,
    /// 默认全部类别
    pub categories: Option<Vec<CostCategory>>,
    /// 是否跳过宏观区域基准
    pub skip_macro_region: bool,
}

/// 单个 (类别, 地区) 任务的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRegionOutcome {
    pub category: CostCategory,
    pub region: String,
    pub result: BenchmarkBatchResult,
}

/// 失败的任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailure {
    pub category: CostCategory,
    pub region: String,
    pub error: String,
}

/// 全量基准计算汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRunSummary {
    pub target_year: i32,
    pub outcomes: Vec<CategoryRegionOutcome>,
    pub failed_tasks: Vec<TaskFailure>,
}

impl BenchmarkRunSummary {
    pub fn total_benchmarks(&self) -> usize {
        self.outcomes.iter().map(|o| o.result.benchmarks.len()).sum()
    }
}

/// 价格比对请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRequest {
    pub target_year: Option<i32>,
    pub target_state: String,
    pub target_district: Option<String>,
    pub as_of: Option<NaiveDate>,
    pub scheme_eligibility: Option<SchemeEligibility>,
}

impl ComparisonRequest {
    pub fn new(target_state: &str) -> Self {
        Self {
            target_year: None,
            target_state: target_state.to_string(),
            target_district: None,
            as_of: None,
            scheme_eligibility: None,
        }
    }

    pub fn with_target_year(mut self, year: i32) -> Self {
        self.target_year = Some(year);
        self
    }
}

// ==========================================
// PriceAnalysisApi - 价格分析 API
// ==========================================
pub struct PriceAnalysisApi<R, C>
where
    R: CostDataRepository + ?Sized + 'static,
    C: AnalysisConfigReader,
{
    repo: Arc<R>,
    config: Arc<C>,
}

impl<R, C> PriceAnalysisApi<R, C>
where
    R: CostDataRepository + ?Sized + 'static,
    C: AnalysisConfigReader,
{
    /// 创建新的PriceAnalysisApi实例
    ///
    /// # 参数
    /// - repo: 成本数据仓储
    /// - config: 分析配置读取器
    pub fn new(repo: Arc<R>, config: Arc<C>) -> Self {
        Self { repo, config }
    }

    async fn settings(&self) -> ApiResult<AnalysisSettings> {
        Ok(self.config.load_settings().await?)
    }

    fn normalizer(&self, settings: &AnalysisSettings) -> Arc<CostNormalizer<R>> {
        Arc::new(CostNormalizer::with_defaults(
            self.repo.clone(),
            settings.inflation_defaults(),
        ))
    }

    fn calculator(&self, settings: &AnalysisSettings) -> Arc<BenchmarkCalculator<R>> {
        Arc::new(BenchmarkCalculator::new(
            self.repo.clone(),
            self.normalizer(settings),
        ))
    }

    // ==========================================
    // 基准计算
    // ==========================================

    /// 计算全部 (类别, 邦) 以及 (类别, 宏观区域) 的基准
    ///
    /// # 返回
    /// - Ok(BenchmarkRunSummary): 各任务结果 + 失败任务清单
    #[instrument(skip(self, request))]
    pub async fn calculate_all_benchmarks(
        &self,
        request: BenchmarkRunRequest,
    ) -> ApiResult<BenchmarkRunSummary> {
        let settings = self.settings().await?;
        let today = Utc::now().date_naive();
        let target_year = request.target_year.unwrap_or_else(|| today.year());
        let options = Arc::new(settings.benchmark_options(target_year, request.as_of.unwrap_or(today)));
        let states = request
            .states
            .clone()
            .unwrap_or_else(|| settings.benchmark_states.clone());
        let categories = request
            .categories
            .clone()
            .unwrap_or_else(|| CostCategory::ALL.to_vec());
        let macro_region = Arc::new(settings.macro_region());
        let calculator = self.calculator(&settings);

        let mut labels: Vec<(CostCategory, String)> = Vec::new();
        let mut handles = Vec::new();

        for &category in &categories {
            for state in &states {
                let calculator = calculator.clone();
                let options = options.clone();
                let task_state = state.clone();
                labels.push((category, state.clone()));
                handles.push(tokio::task::spawn_blocking(move || {
                    calculator.calculate_category_benchmarks(category, &task_state, &options)
                }));
            }

            if !request.skip_macro_region {
                let calculator = calculator.clone();
                let options = options.clone();
                let macro_region = macro_region.clone();
                labels.push((category, macro_region.label.clone()));
                handles.push(tokio::task::spawn_blocking(move || {
                    calculator.calculate_macro_region_benchmarks(category, &macro_region, &options)
                }));
            }
        }

        let results = join_all(handles).await;

        let mut summary = BenchmarkRunSummary {
            target_year,
            ..Default::default()
        };
        for ((category, region), joined) in labels.into_iter().zip(results) {
            match joined {
                Ok(Ok(result)) => summary.outcomes.push(CategoryRegionOutcome {
                    category,
                    region,
                    result,
                }),
                Ok(Err(e)) => {
                    warn!(%category, region = %region, error = %e, "基准计算任务失败");
                    summary.failed_tasks.push(TaskFailure {
                        category,
                        region,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(%category, region = %region, error = %e, "基准计算任务异常退出");
                    summary.failed_tasks.push(TaskFailure {
                        category,
                        region,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            target_year,
            tasks = summary.outcomes.len() + summary.failed_tasks.len(),
            benchmarks = summary.total_benchmarks(),
            failed = summary.failed_tasks.len(),
            "全量基准计算完成"
        );
        Ok(summary)
    }

    /// 计算单个邦、单个类别的基准
    #[instrument(skip(self))]
    pub async fn calculate_category_benchmarks(
        &self,
        category: CostCategory,
        state: &str,
        target_year: Option<i32>,
    ) -> ApiResult<BenchmarkBatchResult> {
        if state.trim().is_empty() {
            return Err(ApiError::InvalidInput("state 不能为空".to_string()));
        }

        let settings = self.settings().await?;
        let today = Utc::now().date_naive();
        let options = settings.benchmark_options(target_year.unwrap_or_else(|| today.year()), today);
        let calculator = self.calculator(&settings);
        let state = state.to_string();

        let result = tokio::task::spawn_blocking(move || {
            calculator.calculate_category_benchmarks(category, &state, &options)
        })
        .await
        .map_err(|e| ApiError::TaskFailed(e.to_string()))??;
        Ok(result)
    }

    /// 计算单个类别的宏观区域基准 (宏观区域取自配置)
    pub async fn calculate_macro_region_benchmarks(
        &self,
        category: CostCategory,
        target_year: Option<i32>,
    ) -> ApiResult<BenchmarkBatchResult> {
        let settings = self.settings().await?;
        let today = Utc::now().date_naive();
        let options = settings.benchmark_options(target_year.unwrap_or_else(|| today.year()), today);
        let macro_region: MacroRegion = settings.macro_region();
        let calculator = self.calculator(&settings);

        let result = tokio::task::spawn_blocking(move || {
            calculator.calculate_macro_region_benchmarks(category, &macro_region, &options)
        })
        .await
        .map_err(|e| ApiError::TaskFailed(e.to_string()))??;
        Ok(result)
    }

    // ==========================================
    // 价格比对
    // ==========================================

    /// 比对 DPR 明细
    ///
    /// # 参数
    /// - project_id: 项目标识
    /// - items: DPR 明细
    /// - request: 目标年/目标邦等
    ///
    /// # 返回
    /// - Ok(PriceComparisonResult): 单项异常在结果的 item_errors 中
    /// - Err(ApiError::InvalidInput): project_id / target_state 为空
    #[instrument(skip(self, items, request), fields(items = items.len()))]
    pub async fn compare_dpr_prices(
        &self,
        project_id: &str,
        items: Vec<DprCostItem>,
        request: ComparisonRequest,
    ) -> ApiResult<PriceComparisonResult> {
        if project_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("project_id 不能为空".to_string()));
        }
        if request.target_state.trim().is_empty() {
            return Err(ApiError::InvalidInput("target_state 不能为空".to_string()));
        }

        let settings = self.settings().await?;
        let target_year = request
            .target_year
            .unwrap_or_else(|| Utc::now().year());
        let mut options = settings.comparison_options(
            target_year,
            &request.target_state,
            request.target_district.as_deref(),
        );
        if let Some(as_of) = request.as_of {
            options.as_of = as_of;
        }
        options.scheme_eligibility = request.scheme_eligibility;

        let comparator = PriceComparator::new(self.repo.clone(), self.normalizer(&settings));
        let project_id = project_id.to_string();

        let result = tokio::task::spawn_blocking(move || {
            comparator.compare(&project_id, &items, &options)
        })
        .await
        .map_err(|e| ApiError::TaskFailed(e.to_string()))?;
        Ok(result)
    }

    // ==========================================
    // 参考数据维护
    // ==========================================

    /// 重新归一化某邦某类别的历史明细并写回
    ///
    /// # 返回
    /// 成功项 + 失败项 (失败项不写回)
    pub async fn renormalize_historical_items(
        &self,
        category: CostCategory,
        state: &str,
        target_year: i32,
    ) -> ApiResult<NormalizationBatch> {
        let settings = self.settings().await?;
        let normalizer = self.normalizer(&settings);
        let repo = self.repo.clone();
        let state = state.to_string();

        let batch = tokio::task::spawn_blocking(move || -> ApiResult<NormalizationBatch> {
            let items = repo.get_historical_cost_items_by_category(category, Some(&state))?;
            let target = NormalizationTarget::new(target_year, &state);
            let mut batch = normalizer.normalize_batch(&items, &target);

            // 写回失败的明细转入失败项, 其余照常写回
            let mut written = Vec::with_capacity(batch.successes.len());
            for normalized in std::mem::take(&mut batch.successes) {
                match repo.update_normalized_values(&normalized.item_id, &normalized) {
                    Ok(()) => written.push(normalized),
                    Err(e) => {
                        warn!(item_id = %normalized.item_id, error = %e, "归一化结果写回失败");
                        let description = items
                            .iter()
                            .find(|item| item.id == normalized.item_id)
                            .map(|item| item.description.clone())
                            .unwrap_or_default();
                        batch.failures.push(ItemFailure {
                            item_id: normalized.item_id.clone(),
                            description,
                            error: e.to_string(),
                            fallback: None,
                        });
                    }
                }
            }
            batch.successes = written;
            Ok(batch)
        })
        .await
        .map_err(|e| ApiError::TaskFailed(e.to_string()))??;

        info!(
            %category,
            updated = batch.successes.len(),
            failed = batch.failures.len(),
            "历史明细重新归一化完成"
        );
        Ok(batch)
    }

    /// 导入历史成本 CSV
    ///
    /// # 返回
    /// - Ok(ImportReport): 行级错误记录在报告中, 不中断导入
    /// - Err(ApiError::NotFound): 文件不存在
    /// - Err(ApiError::ImportError): 格式不支持 / 缺少必填列
    #[instrument(skip(self))]
    pub async fn import_historical_csv(&self, path: &str) -> ApiResult<ImportReport> {
        if path.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件路径不能为空".to_string()));
        }
        let importer = HistoricalCsvImporter::new(self.repo.clone());
        let path = path.to_string();

        let report = tokio::task::spawn_blocking(move || importer.import_file(&path))
            .await
            .map_err(|e| ApiError::TaskFailed(e.to_string()))??;

        if !report.errors.is_empty() {
            warn!(rejected = report.errors.len(), "部分历史明细行被拒绝");
        }
        Ok(report)
    }

    /// 按配置的默认年增长率写入通胀系数
    pub async fn seed_inflation_factors(&self, years: RangeInclusive<i32>) -> ApiResult<usize> {
        let settings = self.settings().await?;
        let defaults = settings.inflation_defaults();
        let repo = self.repo.clone();

        let written = tokio::task::spawn_blocking(move || {
            reference_data::seed_inflation_factors(repo.as_ref(), &defaults, years)
        })
        .await
        .map_err(|e| ApiError::TaskFailed(e.to_string()))??;
        Ok(written)
    }
}
