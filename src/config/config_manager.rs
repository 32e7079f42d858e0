// ==========================================
// DPR 价格分析核心 - 配置管理器
// ==========================================
// 职责: 分析配置加载、查询、覆写
// 存储: config_kv 表 (scope_id='global', 值为纯文本或 JSON)
// 约定: 配置缺失或格式错误时回退默认值并记录告警
// ==========================================

use crate::config::analysis_config_trait::AnalysisConfigReader;
use crate::config::analysis_settings::AnalysisSettings;
use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::domain::CostCategory;
use crate::repository::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
    defaults: AnalysisSettings,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            defaults: AnalysisSettings::default(),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 会对传入连接再次应用统一 PRAGMA (幂等)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
        }

        Ok(Self {
            conn,
            defaults: AnalysisSettings::default(),
        })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入 global scope 的配置值 (覆盖)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置, 缺失或解析失败时返回默认值
    fn get_parsed_or<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr,
    {
        match self.get_global_config_value(key)? {
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    warn!(config_key = key, raw_value = %raw, "配置格式错误, 使用默认值");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    /// 逗号分隔列表
    fn get_list_or(&self, key: &str, default: &[String]) -> RepositoryResult<Vec<String>> {
        let list: Vec<String> = match self.get_global_config_value(key)? {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => Vec::new(),
        };

        if list.is_empty() {
            Ok(default.to_vec())
        } else {
            Ok(list)
        }
    }
}

// ==========================================
// AnalysisConfigReader Trait 实现
// ==========================================
#[async_trait]
impl AnalysisConfigReader for ConfigManager {
    async fn get_deviation_threshold(&self) -> RepositoryResult<f64> {
        self.get_parsed_or(
            config_keys::DEVIATION_THRESHOLD,
            self.defaults.deviation_threshold,
        )
    }

    async fn get_confidence_level(&self) -> RepositoryResult<f64> {
        self.get_parsed_or(config_keys::CONFIDENCE_LEVEL, self.defaults.confidence_level)
    }

    async fn get_allow_ad_hoc_benchmarks(&self) -> RepositoryResult<bool> {
        self.get_parsed_or(
            config_keys::ALLOW_AD_HOC_BENCHMARKS,
            self.defaults.allow_ad_hoc_benchmarks,
        )
    }

    async fn get_min_sample_size(&self) -> RepositoryResult<usize> {
        self.get_parsed_or(config_keys::MIN_SAMPLE_SIZE, self.defaults.min_sample_size)
    }

    async fn get_outlier_z_threshold(&self) -> RepositoryResult<f64> {
        self.get_parsed_or(
            config_keys::OUTLIER_Z_THRESHOLD,
            self.defaults.outlier_z_threshold,
        )
    }

    async fn get_include_outliers(&self) -> RepositoryResult<bool> {
        self.get_parsed_or(config_keys::INCLUDE_OUTLIERS, self.defaults.include_outliers)
    }

    async fn get_benchmark_states(&self) -> RepositoryResult<Vec<String>> {
        self.get_list_or(config_keys::BENCHMARK_STATES, &self.defaults.benchmark_states)
    }

    async fn get_macro_region_label(&self) -> RepositoryResult<String> {
        Ok(self
            .get_global_config_value(config_keys::MACRO_REGION_LABEL)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.defaults.macro_region_label.clone()))
    }

    async fn get_macro_region_states(&self) -> RepositoryResult<Vec<String>> {
        self.get_list_or(
            config_keys::MACRO_REGION_STATES,
            &self.defaults.macro_region_states,
        )
    }

    async fn get_base_year(&self) -> RepositoryResult<i32> {
        self.get_parsed_or(config_keys::BASE_YEAR, self.defaults.base_year)
    }

    /// JSON 格式: {"LABOR": 0.08, "MATERIALS": 0.07}
    ///
    /// 只覆盖给出的类别, 其余沿用默认值
    async fn get_inflation_rates(&self) -> RepositoryResult<HashMap<CostCategory, f64>> {
        let mut rates = self.defaults.inflation_rates.clone();
        let raw = match self.get_global_config_value(config_keys::INFLATION_RATES)? {
            Some(raw) => raw,
            None => return Ok(rates),
        };

        match serde_json::from_str::<HashMap<String, f64>>(&raw) {
            Ok(overrides) => {
                for (key, rate) in overrides {
                    match key.parse::<CostCategory>() {
                        Ok(category) => {
                            rates.insert(category, rate);
                        }
                        Err(e) => warn!(config_key = config_keys::INFLATION_RATES, error = %e, "忽略未知类别"),
                    }
                }
            }
            Err(e) => warn!(
                config_key = config_keys::INFLATION_RATES,
                raw_value = %raw,
                error = %e,
                "通胀率配置格式错误, 使用默认值"
            ),
        }
        Ok(rates)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 比对
    pub const DEVIATION_THRESHOLD: &str = "deviation_threshold";
    pub const CONFIDENCE_LEVEL: &str = "confidence_level";
    pub const ALLOW_AD_HOC_BENCHMARKS: &str = "allow_ad_hoc_benchmarks";

    // 基准计算
    pub const MIN_SAMPLE_SIZE: &str = "min_sample_size";
    pub const OUTLIER_Z_THRESHOLD: &str = "outlier_z_threshold";
    pub const INCLUDE_OUTLIERS: &str = "include_outliers";
    pub const BENCHMARK_STATES: &str = "benchmark_states"; // 逗号分隔

    // 宏观区域
    pub const MACRO_REGION_LABEL: &str = "macro_region_label";
    pub const MACRO_REGION_STATES: &str = "macro_region_states"; // 逗号分隔

    // 通胀
    pub const BASE_YEAR: &str = "base_year";
    pub const INFLATION_RATES: &str = "inflation_rates"; // JSON
}
