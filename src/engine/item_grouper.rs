// ==========================================
// DPR 价格分析核心 - 明细描述分组引擎
// ==========================================
// 职责: 将自由文本描述相近的成本明细归为同一分组
// 算法: 词集合 Jaccard 相似度, 阈值 0.8, 首个命中分组胜出
// 红线: 输入顺序固定时分组结果必须稳定 (不做最优匹配/聚类)
// ==========================================

use std::collections::HashSet;

/// 默认相似度阈值 (严格大于才归入已有分组)
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// 描述归一化: 小写、去标点、合并空白
pub fn normalize_description(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn token_set(normalized: &str) -> HashSet<&str> {
    normalized.split_whitespace().collect()
}

/// 两组词集合的 Jaccard 相似度 (均为空时视为完全相同)
fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// 原始描述的 Jaccard 相似度 (内部先归一化)
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_description(a);
    let b = normalize_description(b);
    jaccard(&token_set(&a), &token_set(&b))
}

// ==========================================
// DescriptionGroup - 描述分组
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptionGroup<T> {
    /// 分组代表描述 (首个成员的归一化描述)
    pub canonical_description: String,
    pub items: Vec<T>,
}

impl<T> DescriptionGroup<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ==========================================
// ItemGrouper - 明细分组引擎
// ==========================================
#[derive(Debug, Clone)]
pub struct ItemGrouper {
    threshold: f64,
}

impl Default for ItemGrouper {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemGrouper {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 两段描述是否应归为同一分组
    pub fn is_similar(&self, a: &str, b: &str) -> bool {
        let a = normalize_description(a);
        let b = normalize_description(b);
        a == b || jaccard(&token_set(&a), &token_set(&b)) > self.threshold
    }

    /// 按描述分组
    ///
    /// # 参数
    /// - items: 待分组明细 (顺序决定分组结果)
    /// - description_of: 取明细描述
    ///
    /// # 返回
    /// 分组列表, 按分组创建顺序排列; 每条明细归入第一个相似度超过阈值的分组
    pub fn group<T, F>(&self, items: &[T], description_of: F) -> Vec<DescriptionGroup<T>>
    where
        T: Clone,
        F: Fn(&T) -> &str,
    {
        let mut groups: Vec<DescriptionGroup<T>> = Vec::new();

        for item in items {
            let normalized = normalize_description(description_of(item));
            let tokens = token_set(&normalized);

            let target = groups.iter().position(|group| {
                group.canonical_description == normalized
                    || jaccard(&token_set(&group.canonical_description), &tokens) > self.threshold
            });

            match target {
                Some(idx) => groups[idx].items.push(item.clone()),
                None => groups.push(DescriptionGroup {
                    canonical_description: normalized.clone(),
                    items: vec![item.clone()],
                }),
            }
        }

        groups
    }
}
