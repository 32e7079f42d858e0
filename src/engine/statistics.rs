// ==========================================
// DPR 价格分析核心 - 统计辅助函数
// ==========================================
// 职责: 均值/中位数/总体标准差/四分位/偏度/峰度/置信区间/离群剔除
// 约定: 空输入返回 0.0 (或 None), 不产生 NaN
// ==========================================

use crate::domain::{BenchmarkStatistics, ConfidenceInterval};
use std::cmp::Ordering;

/// 未列出的置信水平使用的 z 值
pub const DEFAULT_Z_VALUE: f64 = 1.96;

/// 置信水平 -> 双侧 z 值
const Z_TABLE: [(f64, f64); 3] = [(0.90, 1.645), (0.95, 1.96), (0.99, 2.576)];

/// 升序排序 (NaN 视为相等)
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    v
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 中位数 (偶数个取中间两数平均)
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let v = sorted(values);
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        v[mid]
    } else {
        (v[mid - 1] + v[mid]) / 2.0
    }
}

/// 总体标准差 (除以 n)
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// 样本标准差 (除以 n-1), 供偏度/峰度的调整公式使用
fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// 分位数 (已排序输入, 线性插值, 位置 = p * (n - 1))
pub fn quantile_sorted(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    let pos = p * (sorted_values.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return sorted_values[lower];
    }
    let weight = pos - lower as f64;
    sorted_values[lower] * (1.0 - weight) + sorted_values[upper] * weight
}

/// 调整偏度 G1 = n / ((n-1)(n-2)) * Σ((x - mean) / s)^3
///
/// n < 3 或 s == 0 时返回 0.0
pub fn skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let s = sample_std_dev(values);
    if s == 0.0 {
        return 0.0;
    }
    let m = mean(values);
    let n = n as f64;
    let sum_cubed: f64 = values.iter().map(|x| ((x - m) / s).powi(3)).sum();
    n / ((n - 1.0) * (n - 2.0)) * sum_cubed
}

/// 调整超额峰度
/// G2 = n(n+1) / ((n-1)(n-2)(n-3)) * Σ((x - mean) / s)^4 - 3(n-1)^2 / ((n-2)(n-3))
///
/// n < 4 或 s == 0 时返回 0.0
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return 0.0;
    }
    let s = sample_std_dev(values);
    if s == 0.0 {
        return 0.0;
    }
    let m = mean(values);
    let n = n as f64;
    let sum_fourth: f64 = values.iter().map(|x| ((x - m) / s).powi(4)).sum();
    n * (n + 1.0) / ((n - 1.0) * (n - 2.0) * (n - 3.0)) * sum_fourth
        - 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0))
}

/// 置信水平对应的 z 值 (表外水平默认 1.96)
pub fn z_value_for(confidence_level: f64) -> f64 {
    Z_TABLE
        .iter()
        .find(|(level, _)| (level - confidence_level).abs() < 1e-9)
        .map(|(_, z)| *z)
        .unwrap_or(DEFAULT_Z_VALUE)
}

/// 均值置信区间 mean ± z * (std_dev / √n)
pub fn confidence_interval(values: &[f64], confidence_level: f64) -> ConfidenceInterval {
    let m = mean(values);
    if values.is_empty() {
        return ConfidenceInterval {
            level: confidence_level,
            lower: 0.0,
            upper: 0.0,
        };
    }
    let margin =
        z_value_for(confidence_level) * population_std_dev(values) / (values.len() as f64).sqrt();
    ConfidenceInterval {
        level: confidence_level,
        lower: m - margin,
        upper: m + margin,
    }
}

/// z 分数 |x - mean| / std_dev 超过阈值的值被剔除
///
/// # 返回
/// (保留值, 剔除值), 均保持输入顺序; std_dev 为 0 时不剔除
pub fn remove_outliers(values: &[f64], z_threshold: f64) -> (Vec<f64>, Vec<f64>) {
    let m = mean(values);
    let sd = population_std_dev(values);
    if sd == 0.0 {
        return (values.to_vec(), Vec::new());
    }
    values
        .iter()
        .copied()
        .partition(|x| ((x - m).abs() / sd) <= z_threshold)
}

/// 完整统计描述 (空输入返回 None)
pub fn describe(values: &[f64], confidence_level: f64) -> Option<BenchmarkStatistics> {
    if values.is_empty() {
        return None;
    }
    let v = sorted(values);
    let q1 = quantile_sorted(&v, 0.25);
    let q3 = quantile_sorted(&v, 0.75);
    Some(BenchmarkStatistics {
        count: v.len(),
        mean: mean(&v),
        median: median(&v),
        std_dev: population_std_dev(&v),
        min: v[0],
        max: v[v.len() - 1],
        q1,
        q3,
        iqr: q3 - q1,
        skewness: skewness(&v),
        kurtosis: excess_kurtosis(&v),
        confidence_interval: confidence_interval(&v, confidence_level),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_population_std_dev_divides_by_n() {
        // 经典样例: 均值 5, 总体方差 4
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx(population_std_dev(&values), 2.0));
    }

    #[test]
    fn test_quartiles_linear_interpolation() {
        let v = sorted(&[1.0, 2.0, 3.0, 4.0]);
        assert!(approx(quantile_sorted(&v, 0.25), 1.75));
        assert!(approx(quantile_sorted(&v, 0.75), 3.25));
        assert!(approx(quantile_sorted(&v, 0.5), 2.5));
    }

    #[test]
    fn test_skewness_sign() {
        assert!(approx(skewness(&[1.0, 2.0, 3.0]), 0.0));
        assert!(skewness(&[1.0, 1.0, 1.0, 2.0, 10.0]) > 0.0);
        assert!(skewness(&[1.0, 9.0, 10.0, 10.0, 10.0]) < 0.0);
    }

    #[test]
    fn test_kurtosis_small_samples_are_zero() {
        assert_eq!(excess_kurtosis(&[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(excess_kurtosis(&[5.0, 5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_kurtosis_uniform_like_sample() {
        // 1..=5: G2 = -1.2
        let k = excess_kurtosis(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(approx(k, -1.2));
    }

    #[test]
    fn test_z_table() {
        assert_eq!(z_value_for(0.90), 1.645);
        assert_eq!(z_value_for(0.95), 1.96);
        assert_eq!(z_value_for(0.99), 2.576);
        assert_eq!(z_value_for(0.80), DEFAULT_Z_VALUE);
    }

    #[test]
    fn test_confidence_interval_is_symmetric() {
        let values = [10.0, 12.0, 14.0, 16.0];
        let ci = confidence_interval(&values, 0.95);
        let m = mean(&values);
        assert!(approx(m - ci.lower, ci.upper - m));
        let expected_margin = 1.96 * population_std_dev(&values) / 2.0;
        assert!(approx(ci.upper - m, expected_margin));
    }

    #[test]
    fn test_remove_outliers() {
        let values = [100.0, 101.0, 99.0, 100.0, 102.0, 98.0, 100.0, 101.0, 99.0, 300.0];
        let (kept, removed) = remove_outliers(&values, 2.0);
        assert_eq!(removed, vec![300.0]);
        assert_eq!(kept.len(), 9);

        let (kept_all, removed_none) = remove_outliers(&[5.0, 5.0, 5.0], 2.0);
        assert_eq!(kept_all.len(), 3);
        assert!(removed_none.is_empty());
    }

    #[test]
    fn test_describe() {
        let stats = describe(&[3.0, 1.0, 2.0], 0.95).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.median, 2.0);
        assert!(describe(&[], 0.95).is_none());
    }
}
