// ==========================================
// DPR 价格分析核心 - SQLite 成本数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::{
    CostCategory, HistoricalCostItem, InflationFactor, NormalizedCost, PriceBenchmark,
    RegionalCostFactor,
};
use crate::repository::cost_data_repo::CostDataRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const DATE_FORMAT: &str = "%Y-%m-%d";

// ==========================================
// SqliteCostRepository - SQLite 成本数据仓储
// ==========================================

/// SQLite 成本数据仓储
/// 职责: 管理 regional_cost_factor / inflation_factor / historical_cost_item / price_benchmark 表
pub struct SqliteCostRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCostRepository {
    /// 打开数据库并确保 schema 存在
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例 (调用方负责 schema)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 共享底层连接 (供 ConfigManager 复用)
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

// ==========================================
// 行映射辅助函数
// ==========================================

fn parse_category(idx: usize, raw: String) -> SqliteResult<CostCategory> {
    raw.parse::<CostCategory>()
        .map_err(|msg| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into()))
}

fn parse_date(idx: usize, raw: String) -> SqliteResult<NaiveDate> {
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

fn parse_timestamp(idx: usize, raw: String) -> SqliteResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 邦级记录的 district 以空串存储
fn district_key(district: Option<&str>) -> &str {
    district.unwrap_or("")
}

fn map_regional_factor(row: &Row<'_>) -> SqliteResult<RegionalCostFactor> {
    let district: String = row.get(1)?;
    let effective_to: Option<String> = row.get(6)?;
    Ok(RegionalCostFactor {
        state: row.get(0)?,
        district: if district.is_empty() { None } else { Some(district) },
        category: parse_category(2, row.get(2)?)?,
        factor: row.get(3)?,
        base_year: row.get(4)?,
        effective_from: parse_date(5, row.get(5)?)?,
        effective_to: effective_to.map(|s| parse_date(6, s)).transpose()?,
    })
}

fn map_inflation_factor(row: &Row<'_>) -> SqliteResult<InflationFactor> {
    Ok(InflationFactor {
        year: row.get(0)?,
        category: parse_category(1, row.get(1)?)?,
        inflation_rate: row.get(2)?,
        cumulative_factor: row.get(3)?,
        base_year: row.get(4)?,
    })
}

fn map_historical_item(row: &Row<'_>) -> SqliteResult<HistoricalCostItem> {
    Ok(HistoricalCostItem {
        id: row.get(0)?,
        project_id: row.get(1)?,
        category: parse_category(2, row.get(2)?)?,
        description: row.get(3)?,
        unit: row.get(4)?,
        quantity: row.get(5)?,
        unit_rate: row.get(6)?,
        total_cost: row.get(7)?,
        state: row.get(8)?,
        district: row.get(9)?,
        normalized_unit_rate: row.get(10)?,
        regional_factor: row.get(11)?,
        inflation_factor: row.get(12)?,
    })
}

fn map_benchmark(row: &Row<'_>) -> SqliteResult<PriceBenchmark> {
    let sample_size: i64 = row.get(10)?;
    Ok(PriceBenchmark {
        id: row.get(0)?,
        item_category: parse_category(1, row.get(1)?)?,
        item_description: row.get(2)?,
        unit: row.get(3)?,
        region: row.get(4)?,
        average_unit_rate: row.get(5)?,
        median_unit_rate: row.get(6)?,
        min_unit_rate: row.get(7)?,
        max_unit_rate: row.get(8)?,
        standard_deviation: row.get(9)?,
        sample_size: sample_size.max(0) as usize,
        last_updated: parse_timestamp(11, row.get(11)?)?,
        base_year: row.get(12)?,
    })
}

const REGIONAL_COLUMNS: &str =
    "state, district, category, factor, base_year, effective_from, effective_to";

const HISTORICAL_COLUMNS: &str = "id, project_id, category, description, unit, quantity, \
     unit_rate, total_cost, state, district, normalized_unit_rate, regional_factor, inflation_factor";

const BENCHMARK_COLUMNS: &str = "id, item_category, item_description, unit, region, \
     average_unit_rate, median_unit_rate, min_unit_rate, max_unit_rate, standard_deviation, \
     sample_size, last_updated, base_year";

// ==========================================
// CostDataRepository 实现
// ==========================================

impl CostDataRepository for SqliteCostRepository {
    fn get_regional_cost_factor(
        &self,
        state: &str,
        category: CostCategory,
        as_of: NaiveDate,
        district: Option<&str>,
    ) -> RepositoryResult<Option<RegionalCostFactor>> {
        let conn = self.get_conn()?;
        let as_of_str = as_of.format(DATE_FORMAT).to_string();

        let sql = format!(
            r#"
            SELECT {REGIONAL_COLUMNS}
            FROM regional_cost_factor
            WHERE state = ?1 COLLATE NOCASE
              AND district = ?2 COLLATE NOCASE
              AND category = ?3
              AND effective_from <= ?4
              AND (effective_to IS NULL OR effective_to >= ?4)
            ORDER BY effective_from DESC
            LIMIT 1
            "#
        );

        let factor = conn
            .query_row(
                &sql,
                params![state, district_key(district), category.as_str(), as_of_str],
                map_regional_factor,
            )
            .optional()?;

        Ok(factor)
    }

    fn get_inflation_factor(
        &self,
        year: i32,
        category: CostCategory,
        base_year: i32,
    ) -> RepositoryResult<Option<InflationFactor>> {
        let conn = self.get_conn()?;

        let factor = conn
            .query_row(
                r#"
                SELECT year, category, inflation_rate, cumulative_factor, base_year
                FROM inflation_factor
                WHERE year = ?1 AND category = ?2 AND base_year = ?3
                "#,
                params![year, category.as_str(), base_year],
                map_inflation_factor,
            )
            .optional()?;

        Ok(factor)
    }

    fn upsert_regional_cost_factor(&self, factor: &RegionalCostFactor) -> RepositoryResult<()> {
        factor
            .validate()
            .map_err(RepositoryError::ValidationError)?;

        let conn = self.get_conn()?;
        let district = district_key(factor.district.as_deref());

        // 同作用域已有记录 (用于区间重叠校验)
        let sql = format!(
            r#"
            SELECT {REGIONAL_COLUMNS}
            FROM regional_cost_factor
            WHERE state = ?1 COLLATE NOCASE
              AND district = ?2 COLLATE NOCASE
              AND category = ?3
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let existing = stmt
            .query_map(
                params![factor.state, district, factor.category.as_str()],
                map_regional_factor,
            )?
            .collect::<SqliteResult<Vec<RegionalCostFactor>>>()?;

        for other in existing
            .iter()
            .filter(|other| other.effective_from != factor.effective_from)
        {
            if other.overlaps(factor) {
                return Err(RepositoryError::OverlappingEffectiveRange {
                    scope: format!(
                        "{}/{}/{}",
                        factor.state,
                        factor.district.as_deref().unwrap_or("-"),
                        factor.category
                    ),
                    existing_from: other.effective_from.to_string(),
                    new_from: factor.effective_from.to_string(),
                });
            }
        }

        conn.execute(
            r#"
            INSERT OR REPLACE INTO regional_cost_factor (
                state, district, category, factor, base_year, effective_from, effective_to
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                factor.state,
                district,
                factor.category.as_str(),
                factor.factor,
                factor.base_year,
                factor.effective_from.format(DATE_FORMAT).to_string(),
                factor
                    .effective_to
                    .map(|d| d.format(DATE_FORMAT).to_string()),
            ],
        )?;

        Ok(())
    }

    fn upsert_inflation_factor(&self, factor: &InflationFactor) -> RepositoryResult<()> {
        factor
            .validate()
            .map_err(RepositoryError::ValidationError)?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO inflation_factor (year, category, inflation_rate, cumulative_factor, base_year)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(year, category, base_year) DO UPDATE SET
                inflation_rate = excluded.inflation_rate,
                cumulative_factor = excluded.cumulative_factor
            "#,
            params![
                factor.year,
                factor.category.as_str(),
                factor.inflation_rate,
                factor.cumulative_factor,
                factor.base_year,
            ],
        )?;

        Ok(())
    }

    fn get_historical_cost_items_by_category(
        &self,
        category: CostCategory,
        state: Option<&str>,
    ) -> RepositoryResult<Vec<HistoricalCostItem>> {
        let conn = self.get_conn()?;

        let items = match state {
            Some(state) => {
                let sql = format!(
                    "SELECT {HISTORICAL_COLUMNS} FROM historical_cost_item \
                     WHERE category = ?1 AND state = ?2 COLLATE NOCASE ORDER BY seq"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![category.as_str(), state], map_historical_item)?
                    .collect::<SqliteResult<Vec<HistoricalCostItem>>>()?;
                rows
            }
            None => {
                let sql = format!(
                    "SELECT {HISTORICAL_COLUMNS} FROM historical_cost_item \
                     WHERE category = ?1 ORDER BY seq"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![category.as_str()], map_historical_item)?
                    .collect::<SqliteResult<Vec<HistoricalCostItem>>>()?;
                rows
            }
        };

        Ok(items)
    }

    fn insert_historical_cost_item(&self, item: &HistoricalCostItem) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO historical_cost_item (
                id, project_id, category, description, unit, quantity, unit_rate, total_cost,
                state, district, normalized_unit_rate, regional_factor, inflation_factor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                item.id,
                item.project_id,
                item.category.as_str(),
                item.description,
                item.unit,
                item.quantity,
                item.unit_rate,
                item.total_cost,
                item.state,
                item.district,
                item.normalized_unit_rate,
                item.regional_factor,
                item.inflation_factor,
            ],
        )?;
        Ok(())
    }

    fn update_normalized_values(
        &self,
        item_id: &str,
        normalized: &NormalizedCost,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE historical_cost_item
            SET normalized_unit_rate = ?1, regional_factor = ?2, inflation_factor = ?3
            WHERE id = ?4
            "#,
            params![
                normalized.normalized_unit_rate,
                normalized.regional_factor,
                normalized.inflation_factor,
                item_id,
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "HistoricalCostItem".to_string(),
                id: item_id.to_string(),
            });
        }
        Ok(())
    }

    fn get_price_benchmark(
        &self,
        category: CostCategory,
        description: &str,
        region: &str,
        unit: Option<&str>,
    ) -> RepositoryResult<Option<PriceBenchmark>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {BENCHMARK_COLUMNS} FROM price_benchmark \
             WHERE item_category = ?1 AND item_description = ?2 AND region = ?3 COLLATE NOCASE"
        );

        let benchmark = conn
            .query_row(
                &sql,
                params![category.as_str(), description, region],
                map_benchmark,
            )
            .optional()?;

        Ok(benchmark.filter(|b| b.accepts_unit(unit)))
    }

    fn create_or_update_price_benchmark(
        &self,
        benchmark: &PriceBenchmark,
    ) -> RepositoryResult<PriceBenchmark> {
        let conn = self.get_conn()?;

        // UPSERT: 唯一键冲突时保留原 id, 其余字段覆盖
        conn.execute(
            r#"
            INSERT INTO price_benchmark (
                id, item_category, item_description, unit, region,
                average_unit_rate, median_unit_rate, min_unit_rate, max_unit_rate,
                standard_deviation, sample_size, last_updated, base_year
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(item_category, item_description, region) DO UPDATE SET
                unit = excluded.unit,
                average_unit_rate = excluded.average_unit_rate,
                median_unit_rate = excluded.median_unit_rate,
                min_unit_rate = excluded.min_unit_rate,
                max_unit_rate = excluded.max_unit_rate,
                standard_deviation = excluded.standard_deviation,
                sample_size = excluded.sample_size,
                last_updated = excluded.last_updated,
                base_year = excluded.base_year
            "#,
            params![
                benchmark.id,
                benchmark.item_category.as_str(),
                benchmark.item_description,
                benchmark.unit,
                benchmark.region,
                benchmark.average_unit_rate,
                benchmark.median_unit_rate,
                benchmark.min_unit_rate,
                benchmark.max_unit_rate,
                benchmark.standard_deviation,
                benchmark.sample_size as i64,
                benchmark.last_updated.to_rfc3339(),
                benchmark.base_year,
            ],
        )?;

        let sql = format!(
            "SELECT {BENCHMARK_COLUMNS} FROM price_benchmark \
             WHERE item_category = ?1 AND item_description = ?2 AND region = ?3"
        );
        let stored = conn.query_row(
            &sql,
            params![
                benchmark.item_category.as_str(),
                benchmark.item_description,
                benchmark.region
            ],
            map_benchmark,
        )?;

        Ok(stored)
    }

    fn list_price_benchmarks(
        &self,
        category: Option<CostCategory>,
        region: Option<&str>,
    ) -> RepositoryResult<Vec<PriceBenchmark>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {BENCHMARK_COLUMNS} FROM price_benchmark \
             WHERE (?1 IS NULL OR item_category = ?1) \
               AND (?2 IS NULL OR region = ?2 COLLATE NOCASE) \
             ORDER BY item_category, region, item_description"
        );

        let mut stmt = conn.prepare(&sql)?;
        let benchmarks = stmt
            .query_map(
                params![category.map(|c| c.as_str()), region],
                map_benchmark,
            )?
            .collect::<SqliteResult<Vec<PriceBenchmark>>>()?;

        Ok(benchmarks)
    }
}
