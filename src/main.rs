// ==========================================
// DPR 价格分析核心 - 基准刷新工具
// ==========================================
// 用法:
//   dpr-price-analyzer [db_path] [historical.csv] [target_year]
// 流程: 打开/初始化数据库 -> 写入默认通胀系数 -> (可选) 导入 CSV
//       -> 全量重算基准 -> 输出汇总
// ==========================================

use anyhow::Context;
use chrono::{Datelike, Utc};
use dpr_price_analyzer::api::{BenchmarkRunRequest, PriceAnalysisApi};
use dpr_price_analyzer::config::{AnalysisConfigReader, ConfigManager};
use dpr_price_analyzer::db::get_default_db_path;
use dpr_price_analyzer::{logging, SqliteCostRepository, APP_NAME, VERSION};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let db_path = args
        .next()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(get_default_db_path);
    let csv_path = args.next().filter(|s| !s.trim().is_empty());
    let target_year = match args.next() {
        Some(raw) => raw
            .trim()
            .parse::<i32>()
            .with_context(|| format!("target_year 格式错误: {}", raw))?,
        None => Utc::now().year(),
    };

    info!("==================================================");
    info!("{} - 基准刷新 (版本 {})", APP_NAME, VERSION);
    info!("使用数据库: {}", db_path);
    info!("==================================================");

    let repo = Arc::new(
        SqliteCostRepository::new(&db_path)
            .with_context(|| format!("无法打开数据库: {}", db_path))?,
    );
    let config = Arc::new(ConfigManager::from_connection(repo.connection())?);
    let settings = config.load_settings().await?;
    let api = PriceAnalysisApi::new(repo.clone(), config);

    let seeded = api
        .seed_inflation_factors(settings.base_year..=target_year.max(settings.base_year))
        .await?;
    info!(seeded, "通胀系数已写入");

    if let Some(csv_path) = csv_path {
        let report = api
            .import_historical_csv(&csv_path)
            .await
            .with_context(|| format!("导入失败: {}", csv_path))?;
        info!(
            imported = report.imported,
            rejected = report.errors.len(),
            "历史明细导入完成"
        );
        for error in &report.errors {
            warn!(row = error.row, "{}", error.message);
        }
    }

    let summary = api
        .calculate_all_benchmarks(BenchmarkRunRequest {
            target_year: Some(target_year),
            ..Default::default()
        })
        .await?;

    for outcome in &summary.outcomes {
        if outcome.result.benchmarks.is_empty() {
            continue;
        }
        info!(
            category = %outcome.category,
            region = %outcome.region,
            benchmarks = outcome.result.benchmarks.len(),
            skipped = outcome.result.skipped_groups.len(),
            "基准已更新"
        );
    }
    for failure in &summary.failed_tasks {
        warn!(
            category = %failure.category,
            region = %failure.region,
            "任务失败: {}",
            failure.error
        );
    }

    println!(
        "target_year={} benchmarks={} failed_tasks={}",
        summary.target_year,
        summary.total_benchmarks(),
        summary.failed_tasks.len()
    );
    Ok(())
}
