// ==========================================
// DPR 价格分析核心 - 日志初始化
// ==========================================
// 过滤: RUST_LOG (缺省 info)
// 输出: DPR_LOG_FORMAT=json 时输出结构化 JSON, 否则为文本
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量
pub const LOG_FORMAT_ENV: &str = "DPR_LOG_FORMAT";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// 解析格式名, 未识别时按文本输出
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }

    fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| Self::parse(&v))
            .unwrap_or(LogFormat::Text)
    }
}

/// 初始化日志系统
///
/// 例如: `RUST_LOG=dpr_price_analyzer::engine=debug DPR_LOG_FORMAT=json`
///
/// 重复初始化时保留已安装的订阅者。
///
/// ```no_run
/// use dpr_price_analyzer::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match LogFormat::from_env() {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true)
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("日志订阅者已存在, 跳过初始化");
    }
}

/// 测试用日志: debug 级别, 输出到测试捕获
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
