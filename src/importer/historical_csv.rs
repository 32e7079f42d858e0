// ==========================================
// DPR 价格分析核心 - 历史成本明细 CSV 导入
// ==========================================
// 表头: id?, project_id, category, description, unit?, quantity?, unit_rate, state, district?
// 红线: 行级错误记录行号后继续, 不中断整个文件
// 红线: 单价/数量非正的行拒绝导入
// ==========================================

use crate::domain::{CostCategory, HistoricalCostItem};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::CostDataRepository;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 必需列
const REQUIRED_COLUMNS: [&str; 5] = ["project_id", "category", "description", "unit_rate", "state"];

/// CSV 原始行 (全部按可选文本读取, 逐字段校验)
#[derive(Debug, Deserialize)]
struct RawHistoricalRow {
    id: Option<String>,
    project_id: Option<String>,
    category: Option<String>,
    description: Option<String>,
    unit: Option<String>,
    quantity: Option<String>,
    unit_rate: Option<String>,
    state: Option<String>,
    district: Option<String>,
}

/// 行级错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 文件行号 (表头为第 1 行)
    pub row: usize,
    pub message: String,
}

/// 解析结果
#[derive(Debug, Clone, Default)]
pub struct ParsedRows {
    pub items: Vec<(usize, HistoricalCostItem)>,
    pub errors: Vec<RowError>,
    pub total_rows: usize,
}

/// 导入报告
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total_rows: usize,
    pub imported: usize,
    pub errors: Vec<RowError>,
}

/// 宽松数值解析: 去空白、去千分位逗号, 含字母视为无效
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() || s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    s.replace(',', "").parse::<f64>().ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, row: usize, field: &str) -> ImportResult<String> {
    non_empty(value).ok_or_else(|| ImportError::MissingField {
        row,
        field: field.to_string(),
    })
}

fn positive_number(value: &str, row: usize, field: &str) -> ImportResult<f64> {
    let parsed = parse_f64_safe(Some(value)).ok_or_else(|| ImportError::TypeConversionError {
        row,
        field: field.to_string(),
        message: format!("无法解析为数值: {}", value),
    })?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(ImportError::NonPositiveValue {
            row,
            field: field.to_string(),
            value: parsed,
        });
    }
    Ok(parsed)
}

/// 原始行 -> 历史明细
fn convert_row(raw: RawHistoricalRow, row: usize) -> ImportResult<HistoricalCostItem> {
    let project_id = required(raw.project_id, row, "project_id")?;
    let category_text = required(raw.category, row, "category")?;
    let category: CostCategory =
        category_text
            .parse()
            .map_err(|message: String| ImportError::TypeConversionError {
                row,
                field: "category".to_string(),
                message,
            })?;
    let description = required(raw.description, row, "description")?;
    let state = required(raw.state, row, "state")?;
    let unit_rate_text = required(raw.unit_rate, row, "unit_rate")?;
    let unit_rate = positive_number(&unit_rate_text, row, "unit_rate")?;

    let mut item = HistoricalCostItem::new(&project_id, category, &description, unit_rate, &state);
    if let Some(id) = non_empty(raw.id) {
        item = item.with_id(&id);
    }
    if let Some(unit) = non_empty(raw.unit) {
        item = item.with_unit(&unit);
    }
    if let Some(quantity_text) = non_empty(raw.quantity) {
        item = item.with_quantity(positive_number(&quantity_text, row, "quantity")?);
    }
    if let Some(district) = non_empty(raw.district) {
        item = item.with_district(&district);
    }
    Ok(item)
}

/// 从任意 reader 解析 CSV
///
/// # 返回
/// - Ok(ParsedRows): 有效明细 (附行号) + 行级错误
/// - Err: 表头缺列 / CSV 结构错误
pub fn parse_historical_csv<Rd: Read>(reader: Rd) -> ImportResult<ParsedRows> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    // 表头统一小写后再按字段名反序列化
    let headers: StringRecord = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(ImportError::MissingColumn(column.to_string()));
        }
    }
    rdr.set_headers(headers);

    let mut parsed = ParsedRows::default();
    for (index, result) in rdr.deserialize::<RawHistoricalRow>().enumerate() {
        let row = index + 2;
        parsed.total_rows += 1;

        let converted = result
            .map_err(|e| ImportError::TypeConversionError {
                row,
                field: "*".to_string(),
                message: e.to_string(),
            })
            .and_then(|raw| convert_row(raw, row));

        match converted {
            Ok(item) => parsed.items.push((row, item)),
            Err(e) => {
                warn!(row, error = %e, "CSV 行校验失败, 已跳过");
                parsed.errors.push(RowError {
                    row,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(parsed)
}

// ==========================================
// HistoricalCsvImporter - 历史成本明细导入器
// ==========================================
pub struct HistoricalCsvImporter<R>
where
    R: CostDataRepository + ?Sized,
{
    repo: Arc<R>,
}

impl<R> HistoricalCsvImporter<R>
where
    R: CostDataRepository + ?Sized,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// 导入 CSV 文件
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn import_file<P: AsRef<Path>>(&self, path: P) -> ImportResult<ImportReport> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return Err(ImportError::UnsupportedFormat(path.display().to_string()));
        }

        let file = std::fs::File::open(path)?;
        self.import_reader(file)
    }

    /// 从 reader 导入 (逐行写入, 写入失败记录后继续)
    pub fn import_reader<Rd: Read>(&self, reader: Rd) -> ImportResult<ImportReport> {
        let parsed = parse_historical_csv(reader)?;
        let mut report = ImportReport {
            total_rows: parsed.total_rows,
            imported: 0,
            errors: parsed.errors,
        };

        for (row, item) in &parsed.items {
            match self.repo.insert_historical_cost_item(item) {
                Ok(()) => report.imported += 1,
                Err(source) => {
                    let e = ImportError::Persist { row: *row, source };
                    warn!(row, error = %e, "历史明细写入失败");
                    report.errors.push(RowError {
                        row: *row,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            total = report.total_rows,
            imported = report.imported,
            errors = report.errors.len(),
            "历史成本明细导入完成"
        );
        Ok(report)
    }
}
