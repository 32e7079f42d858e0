// ==========================================
// DPR 价格分析核心 - 引擎层错误类型
// ==========================================
// 分类:
// - MissingReferenceData: 不致命, 降级为中性系数
// - InsufficientSample:   不是错误, 只是不产出基准
// - NoBenchmarkAvailable: 作为建议记录, 不参与汇总偏差
// - MalformedInput:       单项隔离, 批处理继续
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CostError {
    #[error("参考数据缺失: {0}")]
    MissingReferenceData(String),

    #[error("样本不足: {key} 需要至少 {required} 条, 实际 {actual} 条")]
    InsufficientSample {
        key: String,
        required: usize,
        actual: usize,
    },

    #[error("无可用价格基准: {0}")]
    NoBenchmarkAvailable(String),

    #[error("输入数据异常 (item={item_id}, 字段 {field}): {message}")]
    MalformedInput {
        item_id: String,
        field: String,
        message: String,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CostError {
    pub fn malformed(item_id: &str, field: &str, message: impl Into<String>) -> Self {
        CostError::MalformedInput {
            item_id: item_id.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result 类型别名
pub type CostResult<T> = Result<T, CostError>;
