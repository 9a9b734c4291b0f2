//! 자산 곡선과 체결 로그에서 성과 지표를 계산합니다.
//!
//! 모든 계산은 순수 함수이며 빈 시계열, 단일 포인트, 분산 0 입력에서도
//! 오류 없이 0 값을 돌려줍니다.

use std::collections::BTreeMap;

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use trader_core::{EquityPoint, Fill};
use trader_risk::{kelly_fraction, RiskLevel, RiskLevelInputs};

use super::metrics::{Metrics, SymbolStats};
use super::stats::{excess_kurtosis, mean, percentile, skewness, std_dev, STD_EPSILON};

/// 기본 연간 주기 수 (일 단위, 24/7 시장).
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 365.0;

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// 성과 분석기.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAnalyzer {
    /// 연율화에 사용할 연간 주기 수
    pub periods_per_year: f64,
    /// 연 무위험 이자율
    pub risk_free_rate: f64,
}

impl Default for PerformanceAnalyzer {
    fn default() -> Self {
        Self {
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            risk_free_rate: 0.0,
        }
    }
}

/// `analyze`를 기본 주기(365)로 호출합니다.
pub fn analyze(equity: &[EquityPoint], fills: &[Fill], risk_free_rate: f64) -> Metrics {
    PerformanceAnalyzer::default()
        .with_risk_free_rate(risk_free_rate)
        .analyze(equity, fills)
}

impl PerformanceAnalyzer {
    pub fn new(periods_per_year: f64) -> Self {
        Self {
            periods_per_year,
            ..Self::default()
        }
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    /// 성과 지표 계산.
    pub fn analyze(&self, equity: &[EquityPoint], fills: &[Fill]) -> Metrics {
        let initial_equity = equity.first().map(|p| p.equity).unwrap_or_default();
        let mut metrics = Metrics::empty(initial_equity);
        self.apply_equity_metrics(&mut metrics, equity);
        apply_fill_metrics(&mut metrics, fills);

        metrics.risk_level = RiskLevel::assess(&RiskLevelInputs {
            sharpe_ratio: metrics.sharpe_ratio,
            max_drawdown: metrics.max_drawdown,
            win_rate: metrics.win_rate,
            trades_per_day: trades_per_day(equity, fills.len()),
        });
        metrics
    }

    fn apply_equity_metrics(&self, metrics: &mut Metrics, equity: &[EquityPoint]) {
        let (Some(first), Some(last)) = (equity.first(), equity.last()) else {
            return;
        };
        metrics.final_equity = last.equity;
        metrics.net_profit = last.equity - first.equity;

        let first_value = to_f64(first.equity);
        let last_value = to_f64(last.equity);
        if first_value > 0.0 {
            metrics.total_return = last_value / first_value - 1.0;
        }

        let returns = period_returns(equity);
        metrics.periods = returns.len();
        metrics.annualized_return =
            annualized_return(first_value, last_value, returns.len(), self.periods_per_year);

        let annualizer = self.periods_per_year.sqrt();
        metrics.volatility = std_dev(&returns) * annualizer;

        let rf_period = self.risk_free_rate / self.periods_per_year;
        let excess: Vec<f64> = returns.iter().map(|r| r - rf_period).collect();
        let excess_std = std_dev(&excess);
        if excess.len() >= 2 && excess_std > STD_EPSILON {
            metrics.sharpe_ratio = mean(&excess) / excess_std * annualizer;
        }

        let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        let downside_std = std_dev(&downside);
        if downside.len() >= 2 && downside_std > STD_EPSILON {
            metrics.sortino_ratio = mean(&excess) / downside_std * annualizer;
        }

        let (max_drawdown, duration) = drawdown_profile(equity);
        metrics.max_drawdown = max_drawdown;
        metrics.max_drawdown_duration = duration;
        if max_drawdown < 0.0 {
            metrics.calmar_ratio = metrics.annualized_return / max_drawdown.abs();
        }

        if !returns.is_empty() {
            let var = percentile(&returns, 5.0);
            let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
            metrics.var_95 = var;
            metrics.cvar_95 = mean(&tail);
        }
        metrics.skewness = skewness(&returns);
        metrics.kurtosis = excess_kurtosis(&returns);
    }
}

/// 주기별 수익률 `e_t / e_{t-1} - 1`. 직전 자산이 0 이하인 구간은 제외합니다.
fn period_returns(equity: &[EquityPoint]) -> Vec<f64> {
    equity
        .windows(2)
        .filter_map(|w| {
            let prev = to_f64(w[0].equity);
            let curr = to_f64(w[1].equity);
            (prev > 0.0).then(|| curr / prev - 1.0)
        })
        .filter(|r| r.is_finite())
        .collect()
}

/// `(last / first)^(periods_per_year / n) - 1`.
fn annualized_return(first: f64, last: f64, periods: usize, periods_per_year: f64) -> f64 {
    if periods == 0 || first <= 0.0 {
        return 0.0;
    }
    let ratio = last / first;
    if ratio <= 0.0 {
        return -1.0;
    }
    let annualized = ratio.powf(periods_per_year / periods as f64) - 1.0;
    if annualized.is_finite() {
        annualized
    } else {
        0.0
    }
}

/// 최대 낙폭 (0 이하)과 가장 긴 낙폭 구간 길이.
fn drawdown_profile(equity: &[EquityPoint]) -> (f64, usize) {
    let mut running_max = f64::MIN;
    let mut max_drawdown = 0.0f64;
    let mut current_run = 0usize;
    let mut longest_run = 0usize;

    for point in equity {
        let value = to_f64(point.equity);
        running_max = running_max.max(value);
        let drawdown = if running_max > 0.0 {
            (value - running_max) / running_max
        } else {
            0.0
        };
        max_drawdown = max_drawdown.min(drawdown);

        if drawdown < 0.0 {
            current_run += 1;
            longest_run = longest_run.max(current_run);
        } else {
            current_run = 0;
        }
    }
    (max_drawdown, longest_run)
}

fn trades_per_day(equity: &[EquityPoint], fill_count: usize) -> f64 {
    let span_days = match (equity.first(), equity.last()) {
        (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_seconds() as f64 / 86_400.0,
        _ => 0.0,
    };
    fill_count as f64 / span_days.max(1.0)
}

fn apply_fill_metrics(metrics: &mut Metrics, fills: &[Fill]) {
    let mut gross_profit = Decimal::ZERO;
    let mut gross_loss = Decimal::ZERO;
    let mut by_symbol: BTreeMap<String, SymbolStats> = BTreeMap::new();

    for fill in fills {
        metrics.total_fills += 1;
        metrics.total_fees += fill.fee;
        metrics.total_slippage += fill.slippage_cost;

        let stats = by_symbol.entry(fill.symbol.clone()).or_default();
        stats.fills += 1;
        stats.fees += fill.fee;
        stats.net_pnl -= fill.fee;

        if fill.is_opening() {
            metrics.opening_fills += 1;
            continue;
        }

        metrics.closing_fills += 1;
        stats.closing_fills += 1;
        stats.realized_pnl += fill.realized_pnl_component;
        stats.net_pnl += fill.realized_pnl_component;

        if fill.is_win() {
            metrics.winning_fills += 1;
            stats.winning_fills += 1;
            gross_profit += fill.realized_pnl_component;
        } else if fill.is_loss() {
            metrics.losing_fills += 1;
            stats.losing_fills += 1;
            gross_loss += fill.realized_pnl_component.abs();
        }
    }
    metrics.by_symbol = by_symbol;

    if metrics.closing_fills > 0 {
        metrics.win_rate = metrics.winning_fills as f64 / metrics.closing_fills as f64;
    }

    metrics.profit_factor = if gross_loss > Decimal::ZERO {
        to_f64(gross_profit / gross_loss)
    } else if gross_profit > Decimal::ZERO {
        f64::INFINITY
    } else {
        0.0
    };

    if metrics.winning_fills > 0 {
        metrics.avg_win = gross_profit / Decimal::from(metrics.winning_fills);
    }
    if metrics.losing_fills > 0 {
        metrics.avg_loss = gross_loss / Decimal::from(metrics.losing_fills);
    }
    if metrics.avg_loss > Decimal::ZERO {
        metrics.profit_loss_ratio = to_f64(metrics.avg_win / metrics.avg_loss);
    }

    let win_rate = metrics.win_rate;
    metrics.expectancy =
        win_rate * to_f64(metrics.avg_win) - (1.0 - win_rate) * to_f64(metrics.avg_loss);
    metrics.kelly_fraction = kelly_fraction(win_rate, metrics.profit_loss_ratio);
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use trader_core::{Side, SignalDirection};

    use super::*;

    fn t(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i)
    }

    fn curve(values: &[Decimal]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| EquityPoint::new(t(i as i64), *v))
            .collect()
    }

    fn closing_fill(symbol: &str, pnl: Decimal) -> Fill {
        Fill {
            timestamp: t(1),
            symbol: symbol.to_string(),
            side: Side::Sell,
            direction: SignalDirection::CloseLong,
            requested_qty: dec!(1),
            executed_qty: dec!(1),
            executed_price: dec!(100),
            fee: dec!(0.1),
            realized_pnl_component: pnl,
            slippage_cost: Decimal::ZERO,
            strategy_id: "test".to_string(),
            reason: None,
        }
    }

    fn opening_fill(symbol: &str) -> Fill {
        Fill {
            side: Side::Buy,
            direction: SignalDirection::OpenLong,
            realized_pnl_component: Decimal::ZERO,
            ..closing_fill(symbol, Decimal::ZERO)
        }
    }

    #[test]
    fn test_degenerate_inputs_return_zero_ratios() {
        for series in [curve(&[]), curve(&[dec!(10000)]), curve(&[dec!(100); 10])] {
            let metrics = analyze(&series, &[], 0.0);
            assert_eq!(metrics.sharpe_ratio, 0.0);
            assert_eq!(metrics.sortino_ratio, 0.0);
            assert_eq!(metrics.calmar_ratio, 0.0);
            assert_eq!(metrics.max_drawdown, 0.0);
            assert_eq!(metrics.win_rate, 0.0);
            assert_eq!(metrics.profit_factor, 0.0);
            assert!(metrics.var_95.is_finite());
        }
    }

    #[test]
    fn test_drawdown_and_duration() {
        let series = curve(&[dec!(100), dec!(120), dec!(90), dec!(100), dec!(130), dec!(125)]);
        let metrics = analyze(&series, &[], 0.0);
        assert!((metrics.max_drawdown - (-0.25)).abs() < 1e-12);
        assert_eq!(metrics.max_drawdown_duration, 2);
        assert!(metrics.calmar_ratio > 0.0);
        assert_eq!(metrics.net_profit, dec!(25));
        assert!((metrics.total_return - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_sharpe_and_sortino() {
        let series = curve(&[dec!(100), dec!(102), dec!(101), dec!(104), dec!(103), dec!(106)]);
        let metrics = PerformanceAnalyzer::new(252.0).analyze(&series, &[]);
        assert!(metrics.sharpe_ratio > 0.0);
        assert!(metrics.sortino_ratio > 0.0);
        assert_eq!(metrics.periods, 5);
        assert!(metrics.var_95 < 0.0);
        assert!(metrics.cvar_95 <= metrics.var_95);
    }

    #[test]
    fn test_single_negative_return_gives_zero_sortino() {
        let series = curve(&[dec!(100), dec!(102), dec!(101), dec!(104)]);
        let metrics = analyze(&series, &[], 0.0);
        assert_eq!(metrics.sortino_ratio, 0.0);
    }

    #[test]
    fn test_annualized_return() {
        assert_eq!(annualized_return(100.0, 110.0, 0, 365.0), 0.0);
        assert_eq!(annualized_return(100.0, -5.0, 10, 365.0), -1.0);
        let r = annualized_return(100.0, 110.0, 365, 365.0);
        assert!((r - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_profit_factor_infinite_without_losses() {
        let fills = vec![opening_fill("BTC"), closing_fill("BTC", dec!(10))];
        let metrics = analyze(&curve(&[dec!(100), dec!(110)]), &fills, 0.0);
        assert!(metrics.profit_factor.is_infinite());
        assert_eq!(metrics.win_rate, 1.0);
        assert_eq!(metrics.opening_fills, 1);
        assert_eq!(metrics.closing_fills, 1);
        assert_eq!(metrics.total_fees, dec!(0.2));
    }

    #[test]
    fn test_trade_statistics() {
        let fills = vec![
            closing_fill("BTC", dec!(30)),
            closing_fill("BTC", dec!(-10)),
            closing_fill("ETH", dec!(10)),
            closing_fill("ETH", dec!(-10)),
        ];
        let metrics = analyze(&[], &fills, 0.0);
        assert_eq!(metrics.win_rate, 0.5);
        assert!((metrics.profit_factor - 2.0).abs() < 1e-12);
        assert_eq!(metrics.avg_win, dec!(20));
        assert_eq!(metrics.avg_loss, dec!(10));
        assert!((metrics.profit_loss_ratio - 2.0).abs() < 1e-12);
        assert!((metrics.expectancy - 5.0).abs() < 1e-12);
        assert!((metrics.kelly_fraction - 0.25).abs() < 1e-12);

        let btc = &metrics.by_symbol["BTC"];
        assert_eq!(btc.closing_fills, 2);
        assert_eq!(btc.realized_pnl, dec!(20));
        assert_eq!(btc.net_pnl, dec!(19.8));
        assert_eq!(btc.win_rate(), 0.5);
    }

    proptest! {
        #[test]
        fn prop_win_rate_bounded(pnls in prop::collection::vec(-1000i64..1000, 0..40)) {
            let fills: Vec<Fill> = pnls
                .iter()
                .map(|p| closing_fill("BTC", Decimal::new(*p, 1)))
                .collect();
            let metrics = analyze(&[], &fills, 0.0);
            prop_assert!((0.0..=1.0).contains(&metrics.win_rate));
            prop_assert!(metrics.profit_factor >= 0.0);
            if metrics.winning_fills > 0 && metrics.losing_fills == 0 {
                prop_assert!(metrics.profit_factor.is_infinite());
            }
        }

        #[test]
        fn prop_never_nan(values in prop::collection::vec(1i64..1_000_000, 0..50)) {
            let series: Vec<EquityPoint> = values
                .iter()
                .enumerate()
                .map(|(i, v)| EquityPoint::new(t(i as i64), Decimal::new(*v, 2)))
                .collect();
            let m = analyze(&series, &[], 0.02);
            for value in [m.sharpe_ratio, m.sortino_ratio, m.calmar_ratio, m.max_drawdown,
                          m.var_95, m.cvar_95, m.skewness, m.kurtosis, m.volatility] {
                prop_assert!(!value.is_nan());
            }
            prop_assert!(m.max_drawdown <= 0.0 && m.max_drawdown >= -1.0);
        }
    }
}
