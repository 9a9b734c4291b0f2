//! 성과 지표 기반 리스크 등급.

use serde::{Deserialize, Serialize};

/// 리스크 등급.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Extreme => write!(f, "EXTREME"),
        }
    }
}

/// 등급 산정 입력.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLevelInputs {
    /// 샤프 비율
    pub sharpe_ratio: f64,
    /// 최대 낙폭 (양수 소수, 0.2 = 20%)
    pub max_drawdown: f64,
    /// 승률 (0 ~ 1)
    pub win_rate: f64,
    /// 일평균 체결 수
    pub trades_per_day: f64,
}

impl RiskLevel {
    /// 점수 합산으로 등급을 매깁니다.
    ///
    /// | 항목 | 점수 |
    /// |------|------|
    /// | 샤프 ≥ 2 / ≥ 1 / < 0 | -2 / -1 / +2 |
    /// | 낙폭 ≥ 30% / ≥ 20% / ≥ 10% | +3 / +2 / +1 |
    /// | 승률 ≥ 60% / < 40% | -1 / +1 |
    /// | 일 체결 > 5 / > 2 | +2 / +1 |
    ///
    /// 합계 ≥ 4 Extreme, ≥ 2 High, ≥ -1 Medium, 그 외 Low.
    pub fn assess(inputs: &RiskLevelInputs) -> Self {
        let mut score = 0i32;

        if inputs.sharpe_ratio >= 2.0 {
            score -= 2;
        } else if inputs.sharpe_ratio >= 1.0 {
            score -= 1;
        } else if inputs.sharpe_ratio < 0.0 {
            score += 2;
        }

        let drawdown = inputs.max_drawdown.abs();
        if drawdown >= 0.3 {
            score += 3;
        } else if drawdown >= 0.2 {
            score += 2;
        } else if drawdown >= 0.1 {
            score += 1;
        }

        if inputs.win_rate >= 0.6 {
            score -= 1;
        } else if inputs.win_rate < 0.4 {
            score += 1;
        }

        if inputs.trades_per_day > 5.0 {
            score += 2;
        } else if inputs.trades_per_day > 2.0 {
            score += 1;
        }

        match score {
            s if s >= 4 => RiskLevel::Extreme,
            s if s >= 2 => RiskLevel::High,
            s if s >= -1 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(sharpe: f64, dd: f64, win: f64, freq: f64) -> RiskLevelInputs {
        RiskLevelInputs {
            sharpe_ratio: sharpe,
            max_drawdown: dd,
            win_rate: win,
            trades_per_day: freq,
        }
    }

    #[test]
    fn test_assess() {
        assert_eq!(RiskLevel::assess(&inputs(2.5, 0.05, 0.65, 1.0)), RiskLevel::Low);
        assert_eq!(RiskLevel::assess(&inputs(1.2, 0.12, 0.5, 1.0)), RiskLevel::Medium);
        assert_eq!(RiskLevel::assess(&inputs(0.5, 0.22, 0.5, 1.0)), RiskLevel::High);
        assert_eq!(RiskLevel::assess(&inputs(-0.3, 0.35, 0.3, 6.0)), RiskLevel::Extreme);
    }

    #[test]
    fn test_negative_drawdown_is_treated_as_magnitude() {
        assert_eq!(
            RiskLevel::assess(&inputs(0.5, -0.35, 0.5, 0.0)),
            RiskLevel::assess(&inputs(0.5, 0.35, 0.5, 0.0))
        );
    }
}
