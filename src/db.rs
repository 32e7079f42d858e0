// ==========================================
// DPR 价格分析核心 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 统一建表 (幂等)
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

// 地区列按 NOCASE 排序规则参与主键/唯一键, 与读取时的大小写不敏感匹配一致
const REGIONAL_COST_FACTOR_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS regional_cost_factor (
        state TEXT NOT NULL COLLATE NOCASE,
        district TEXT NOT NULL DEFAULT '' COLLATE NOCASE,
        category TEXT NOT NULL,
        factor REAL NOT NULL CHECK (factor > 0),
        base_year INTEGER NOT NULL,
        effective_from TEXT NOT NULL,
        effective_to TEXT,
        PRIMARY KEY (state, district, category, effective_from)
    );
"#;

const PRICE_BENCHMARK_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS price_benchmark (
        id TEXT PRIMARY KEY,
        item_category TEXT NOT NULL,
        item_description TEXT NOT NULL,
        unit TEXT,
        region TEXT NOT NULL COLLATE NOCASE,
        average_unit_rate REAL NOT NULL,
        median_unit_rate REAL NOT NULL,
        min_unit_rate REAL NOT NULL,
        max_unit_rate REAL NOT NULL,
        standard_deviation REAL NOT NULL,
        sample_size INTEGER NOT NULL,
        last_updated TEXT NOT NULL,
        base_year INTEGER NOT NULL,
        UNIQUE (item_category, item_description, region)
    );
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化 schema (CREATE TABLE IF NOT EXISTS, 可重复执行)
///
/// price_benchmark 的唯一约束即 upsert 键: (item_category, item_description, region)
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    let previous_version = read_schema_version(conn)?;

    conn.execute_batch(REGIONAL_COST_FACTOR_DDL)?;
    conn.execute_batch(PRICE_BENCHMARK_DDL)?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );


        CREATE TABLE IF NOT EXISTS inflation_factor (
            year INTEGER NOT NULL,
            category TEXT NOT NULL,
            inflation_rate REAL NOT NULL,
            cumulative_factor REAL NOT NULL CHECK (cumulative_factor > 0),
            base_year INTEGER NOT NULL,
            PRIMARY KEY (year, category, base_year)
        );

        CREATE TABLE IF NOT EXISTS historical_cost_item (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            project_id TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL,
            unit TEXT,
            quantity REAL,
            unit_rate REAL NOT NULL,
            total_cost REAL NOT NULL,
            state TEXT NOT NULL,
            district TEXT,
            normalized_unit_rate REAL,
            regional_factor REAL,
            inflation_factor REAL
        );
        CREATE INDEX IF NOT EXISTS idx_historical_category_state
            ON historical_cost_item (category, state);

        "#,
    )?;

    if matches!(previous_version, Some(v) if v < 2) {
        migrate_v1_to_v2(conn)?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// v1 -> v2: 地区键改为大小写不敏感
///
/// 重建两张表; 大小写不同的重复键只保留最后写入的一条
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        r#"
        BEGIN;
        ALTER TABLE regional_cost_factor RENAME TO regional_cost_factor_v1;
        {REGIONAL_COST_FACTOR_DDL}
        INSERT OR REPLACE INTO regional_cost_factor
            SELECT * FROM regional_cost_factor_v1 ORDER BY rowid;
        DROP TABLE regional_cost_factor_v1;

        ALTER TABLE price_benchmark RENAME TO price_benchmark_v1;
        {PRICE_BENCHMARK_DDL}
        INSERT OR REPLACE INTO price_benchmark
            SELECT * FROM price_benchmark_v1 ORDER BY last_updated, rowid;
        DROP TABLE price_benchmark_v1;
        COMMIT;
        "#
    ))?;
    tracing::info!("schema 已迁移至 v2 (地区键大小写不敏感)");
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 DPR_PRICE_DB_PATH (若设置)
/// - 否则: 用户数据目录/dpr-price-analyzer/dpr_price.db
/// - 无法获取用户数据目录时: ./dpr_price.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("DPR_PRICE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./dpr_price.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("dpr-price-analyzer");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("dpr_price.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_v1_database_migrated_to_case_insensitive_keys() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            INSERT INTO schema_version (version) VALUES (1);
            CREATE TABLE regional_cost_factor (
                state TEXT NOT NULL,
                district TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL,
                factor REAL NOT NULL CHECK (factor > 0),
                base_year INTEGER NOT NULL,
                effective_from TEXT NOT NULL,
                effective_to TEXT,
                PRIMARY KEY (state, district, category, effective_from)
            );
            CREATE TABLE price_benchmark (
                id TEXT PRIMARY KEY,
                item_category TEXT NOT NULL,
                item_description TEXT NOT NULL,
                unit TEXT,
                region TEXT NOT NULL,
                average_unit_rate REAL NOT NULL,
                median_unit_rate REAL NOT NULL,
                min_unit_rate REAL NOT NULL,
                max_unit_rate REAL NOT NULL,
                standard_deviation REAL NOT NULL,
                sample_size INTEGER NOT NULL,
                last_updated TEXT NOT NULL,
                base_year INTEGER NOT NULL,
                UNIQUE (item_category, item_description, region)
            );
            INSERT INTO price_benchmark VALUES
                ('b-old', 'MATERIALS', 'bitumen mt', 'MT', 'Assam', 1, 1, 1, 1, 0, 5, '2024-01-01T00:00:00+00:00', 2024),
                ('b-new', 'MATERIALS', 'bitumen mt', 'MT', 'ASSAM', 2, 2, 2, 2, 0, 6, '2024-05-01T00:00:00+00:00', 2024);
            INSERT INTO regional_cost_factor VALUES
                ('Assam', '', 'LABOR', 1.1, 2020, '2020-01-01', NULL),
                ('ASSAM', '', 'LABOR', 1.2, 2020, '2020-01-01', NULL);
            "#,
        )
        .unwrap();

        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));

        let (count, id): (i64, String) = conn
            .query_row(
                "SELECT COUNT(*), MAX(id) FROM price_benchmark WHERE region = 'assam'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(id, "b-new");

        let factors: i64 = conn
            .query_row("SELECT COUNT(*) FROM regional_cost_factor", [], |row| row.get(0))
            .unwrap();
        assert_eq!(factors, 1);
    }

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }
}
