// ==========================================
// DPR 价格分析核心 - 配置层
// ==========================================
// 职责: 分析配置管理, 构造引擎的显式参数
// 存储: config_kv 表
// 红线: 引擎不直接读取配置, 由 API 层读取后传入
// ==========================================

pub mod analysis_config_trait;
pub mod analysis_settings;
pub mod config_manager;

// 重导出核心配置管理器
pub use analysis_config_trait::AnalysisConfigReader;
pub use analysis_settings::AnalysisSettings;
pub use config_manager::{config_keys, ConfigManager};
