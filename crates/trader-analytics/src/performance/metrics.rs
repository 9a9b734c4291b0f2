//! 성과 지표 묶음.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use trader_risk::RiskLevel;

/// 프로핏 팩터 역직렬화.
///
/// JSON은 무한대를 `null`로 기록하므로 `null`을 `f64::INFINITY`로 되돌립니다.
fn deserialize_profit_factor<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

/// 심볼별 체결 통계.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolStats {
    pub fills: usize,
    pub closing_fills: usize,
    pub winning_fills: usize,
    pub losing_fills: usize,
    /// 실현 손익 합계 (수수료 제외)
    pub realized_pnl: Decimal,
    pub fees: Decimal,
    /// 실현 손익 - 수수료
    pub net_pnl: Decimal,
}

impl SymbolStats {
    /// 청산 체결 중 수익 비율.
    pub fn win_rate(&self) -> f64 {
        if self.closing_fills == 0 {
            0.0
        } else {
            self.winning_fills as f64 / self.closing_fills as f64
        }
    }
}

/// 백테스트 성과 지표.
///
/// 금액은 `Decimal`, 비율과 통계량은 `f64`입니다.
/// 비율은 소수 표기입니다 (0.1 = 10%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    // === 자산 ===
    pub initial_equity: Decimal,
    pub final_equity: Decimal,
    pub net_profit: Decimal,

    // === 수익률 ===
    pub total_return: f64,
    pub annualized_return: f64,
    /// 연율화 변동성
    pub volatility: f64,

    // === 위험 조정 수익 ===
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,

    // === 낙폭 / 꼬리 위험 ===
    /// 최대 낙폭 (0 이하, -0.2 = 20% 하락)
    pub max_drawdown: f64,
    /// 가장 긴 낙폭 구간 길이 (자산 포인트 수)
    pub max_drawdown_duration: usize,
    pub var_95: f64,
    pub cvar_95: f64,
    pub skewness: f64,
    /// 초과 첨도
    pub kurtosis: f64,

    // === 체결 ===
    pub total_fills: usize,
    pub opening_fills: usize,
    pub closing_fills: usize,
    pub winning_fills: usize,
    pub losing_fills: usize,
    pub win_rate: f64,
    /// 총이익 / 총손실. 손실 없이 이익만 있으면 `f64::INFINITY`.
    #[serde(deserialize_with = "deserialize_profit_factor")]
    pub profit_factor: f64,
    pub avg_win: Decimal,
    /// 평균 손실 (양수)
    pub avg_loss: Decimal,
    pub profit_loss_ratio: f64,
    /// 청산 체결당 기대 손익
    pub expectancy: f64,
    pub kelly_fraction: f64,
    pub total_fees: Decimal,
    pub total_slippage: Decimal,

    /// 수익률 개수
    pub periods: usize,
    pub risk_level: RiskLevel,
    pub by_symbol: BTreeMap<String, SymbolStats>,
}

impl Metrics {
    /// 손익이 없는 빈 지표.
    pub fn empty(initial_equity: Decimal) -> Self {
        Self {
            initial_equity,
            final_equity: initial_equity,
            net_profit: Decimal::ZERO,
            total_return: 0.0,
            annualized_return: 0.0,
            volatility: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            max_drawdown: 0.0,
            max_drawdown_duration: 0,
            var_95: 0.0,
            cvar_95: 0.0,
            skewness: 0.0,
            kurtosis: 0.0,
            total_fills: 0,
            opening_fills: 0,
            closing_fills: 0,
            winning_fills: 0,
            losing_fills: 0,
            win_rate: 0.0,
            profit_factor: 0.0,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            profit_loss_ratio: 0.0,
            expectancy: 0.0,
            kelly_fraction: 0.0,
            total_fees: Decimal::ZERO,
            total_slippage: Decimal::ZERO,
            periods: 0,
            risk_level: RiskLevel::Medium,
            by_symbol: BTreeMap::new(),
        }
    }

    /// 손실 없이 이익만 난 경우.
    pub fn has_infinite_profit_factor(&self) -> bool {
        self.profit_factor.is_infinite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinite_profit_factor_survives_json() {
        let mut metrics = Metrics::empty(Decimal::new(10000, 0));
        metrics.profit_factor = f64::INFINITY;

        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains("\"profit_factor\":null"));

        let restored: Metrics = serde_json::from_str(&json).unwrap();
        assert!(restored.has_infinite_profit_factor());
    }
}
