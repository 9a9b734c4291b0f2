//! 수익률 분포 통계.
//!
//! 표본 표준편차(ddof = 1), 선형 보간 백분위수, 편향 보정 왜도/첨도를 사용합니다.
//! 입력이 부족하거나 분산이 0이면 0을 반환하며 NaN을 만들지 않습니다.

/// 분산이 0으로 간주되는 표준편차 한계.
pub const STD_EPSILON: f64 = 1e-12;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 표본 표준편차. 값이 2개 미만이면 0.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// `q` 백분위수 (0 ~ 100), 인접 순위 간 선형 보간.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// 편향 보정 왜도. 값이 3개 미만이면 0.
pub fn skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let nf = n as f64;
    let m = mean(values);
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / nf;
    if m2.sqrt() < STD_EPSILON {
        return 0.0;
    }
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / nf;
    let g1 = m3 / m2.powf(1.5);
    g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0)
}

/// 편향 보정 초과 첨도 (정규분포 = 0). 값이 4개 미만이면 0.
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return 0.0;
    }
    let nf = n as f64;
    let m = mean(values);
    let s2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    if (s2 / nf).sqrt() < STD_EPSILON {
        return 0.0;
    }
    let s4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>();
    let a = (nf + 1.0) * nf * (nf - 1.0) / ((nf - 2.0) * (nf - 3.0));
    let b = 3.0 * (nf - 1.0).powi(2) / ((nf - 2.0) * (nf - 3.0));
    a * s4 / (s2 * s2) - b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_std_dev_is_sample() {
        assert!(approx(std_dev(&[1.0, 2.0, 3.0, 4.0]), 1.2909944487358056));
        assert_eq!(std_dev(&[5.0]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert!(approx(percentile(&values, 50.0), 3.0));
        assert!(approx(percentile(&values, 5.0), 1.2));
        assert!(approx(percentile(&values, 100.0), 5.0));
        assert_eq!(percentile(&[], 5.0), 0.0);
    }

    #[test]
    fn test_skewness_and_kurtosis() {
        let values = [1.0, 2.0, 3.0, 4.0, 10.0];
        assert!(approx(skewness(&values), 1.6970562748477143));
        assert!(approx(excess_kurtosis(&values), 3.152));

        assert_eq!(skewness(&[1.0, 2.0]), 0.0);
        assert_eq!(excess_kurtosis(&[2.0, 2.0, 2.0, 2.0]), 0.0);
    }
}
