//! 이동평균 교차 전략.
//!
//! 단기 이동평균이 장기 이동평균을 상향 돌파(골든 크로스)하면 롱 진입,
//! 하향 돌파(데드 크로스)하면 롱 청산 후 (허용 시) 숏 진입합니다.
//!
//! 교차 판정은 새 캔들이 확정된 스텝에서만 수행합니다. 캔들이 없는 심볼이
//! 이전 값으로 유지(carry-forward)되는 스텝에서는 신호를 내지 않습니다.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use trader_core::{Bar, Fill, MarketView, PositionSide, Signal, Timeframe};

use crate::strategies::common::simple_moving_average;
use crate::traits::{Strategy, StrategyResult};

/// 설정 검증 오류.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MaCrossConfigError {
    #[error("단기 기간({short})은 0보다 크고 장기 기간({long})보다 작아야 합니다")]
    InvalidPeriods { short: usize, long: usize },
    #[error("주문 수량은 0보다 커야 합니다: {0}")]
    InvalidQuantity(Decimal),
    #[error("비율 설정 {name}은(는) 0 초과 1 미만이어야 합니다: {value}")]
    InvalidPercent { name: &'static str, value: Decimal },
}

/// 이동평균 교차 전략 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaCrossConfig {
    /// 대상 심볼 (비어 있으면 뷰의 모든 심볼)
    #[serde(default)]
    pub symbols: Vec<String>,

    /// 사용할 캔들 주기 (없으면 가장 짧은 주기)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,

    /// 단기 이동평균 기간
    #[serde(default = "default_short_period")]
    pub short_period: usize,

    /// 장기 이동평균 기간
    #[serde(default = "default_long_period")]
    pub long_period: usize,

    /// 진입 수량
    #[serde(default = "default_order_quantity")]
    pub order_quantity: Decimal,

    /// 손절 비율 (예: 0.05 = 5%)
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Option<Decimal>,

    /// 익절 비율 (예: 0.10 = 10%)
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Option<Decimal>,

    /// 숏 허용 여부
    #[serde(default)]
    pub allow_short: bool,

    /// 신호 신뢰도
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_short_period() -> usize {
    10
}
fn default_long_period() -> usize {
    20
}
fn default_order_quantity() -> Decimal {
    Decimal::ONE
}
fn default_stop_loss_pct() -> Option<Decimal> {
    Some(Decimal::new(5, 2))
}
fn default_take_profit_pct() -> Option<Decimal> {
    Some(Decimal::new(10, 2))
}
fn default_confidence() -> f64 {
    0.7
}

impl Default for MaCrossConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            timeframe: None,
            short_period: default_short_period(),
            long_period: default_long_period(),
            order_quantity: default_order_quantity(),
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            allow_short: false,
            confidence: default_confidence(),
        }
    }
}

impl MaCrossConfig {
    pub fn with_periods(mut self, short: usize, long: usize) -> Self {
        self.short_period = short;
        self.long_period = long;
        self
    }

    pub fn with_symbols(mut self, symbols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_order_quantity(mut self, quantity: Decimal) -> Self {
        self.order_quantity = quantity;
        self
    }

    pub fn with_protection(mut self, stop_loss_pct: Option<Decimal>, take_profit_pct: Option<Decimal>) -> Self {
        self.stop_loss_pct = stop_loss_pct;
        self.take_profit_pct = take_profit_pct;
        self
    }

    pub fn with_short(mut self, allow_short: bool) -> Self {
        self.allow_short = allow_short;
        self
    }

    pub fn validate(&self) -> Result<(), MaCrossConfigError> {
        if self.short_period == 0 || self.short_period >= self.long_period {
            return Err(MaCrossConfigError::InvalidPeriods {
                short: self.short_period,
                long: self.long_period,
            });
        }
        if self.order_quantity <= Decimal::ZERO {
            return Err(MaCrossConfigError::InvalidQuantity(self.order_quantity));
        }
        for (name, value) in [
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
        ] {
            if let Some(value) = value {
                if value <= Decimal::ZERO || value >= Decimal::ONE {
                    return Err(MaCrossConfigError::InvalidPercent { name, value });
                }
            }
        }
        Ok(())
    }
}

/// 심볼별 이동평균 상태.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct MaState {
    short: Decimal,
    long: Decimal,
    prev: Option<(Decimal, Decimal)>,
    close: Decimal,
    bar_timestamp: DateTime<Utc>,
}

impl MaState {
    fn golden_cross(&self) -> bool {
        matches!(self.prev, Some((ps, pl)) if ps <= pl && self.short > self.long)
    }

    fn death_cross(&self) -> bool {
        matches!(self.prev, Some((ps, pl)) if ps >= pl && self.short < self.long)
    }
}

/// 이동평균 교차 전략.
#[derive(Debug, Clone)]
pub struct MovingAverageCrossStrategy {
    config: MaCrossConfig,
    indicators: BTreeMap<String, MaState>,
    /// 이번 스텝에 새 캔들이 확정된 심볼
    fresh: BTreeSet<String>,
    /// 체결 통지로 추적한 보유 수량
    holdings: BTreeMap<String, (PositionSide, Decimal)>,
}

impl MovingAverageCrossStrategy {
    pub fn new(config: MaCrossConfig) -> Result<Self, MaCrossConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            indicators: BTreeMap::new(),
            fresh: BTreeSet::new(),
            holdings: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &MaCrossConfig {
        &self.config
    }

    fn series<'a>(&self, view: &MarketView<'a>, symbol: &str) -> Option<&'a [Bar]> {
        match self.config.timeframe {
            Some(tf) => view.history(symbol, tf),
            None => view
                .iter()
                .find(|(key, _)| key.symbol == symbol)
                .map(|(_, bars)| bars),
        }
    }

    fn target_symbols(&self, view: &MarketView<'_>) -> Vec<String> {
        if self.config.symbols.is_empty() {
            view.symbols().into_iter().map(str::to_string).collect()
        } else {
            self.config.symbols.clone()
        }
    }

    fn entry(&self, symbol: &str, side: PositionSide, state: &MaState, reason: &str) -> Signal {
        let price = state.close;
        let (stop_loss, take_profit) = match side {
            PositionSide::Long => (
                self.config.stop_loss_pct.map(|p| price * (Decimal::ONE - p)),
                self.config.take_profit_pct.map(|p| price * (Decimal::ONE + p)),
            ),
            PositionSide::Short => (
                self.config.stop_loss_pct.map(|p| price * (Decimal::ONE + p)),
                self.config.take_profit_pct.map(|p| price * (Decimal::ONE - p)),
            ),
        };
        let signal = match side {
            PositionSide::Long => Signal::open_long(self.name(), symbol, self.config.order_quantity),
            PositionSide::Short => {
                Signal::open_short(self.name(), symbol, self.config.order_quantity)
            }
        };
        signal
            .with_protection(stop_loss, take_profit)
            .with_confidence(self.config.confidence)
            .with_metadata("reason", json!(reason))
            .with_metadata("short_ma", json!(state.short))
            .with_metadata("long_ma", json!(state.long))
    }

    fn exit(&self, symbol: &str, side: PositionSide, qty: Decimal, reason: &str) -> Signal {
        let signal = match side {
            PositionSide::Long => Signal::close_long(self.name(), symbol, qty),
            PositionSide::Short => Signal::close_short(self.name(), symbol, qty),
        };
        signal
            .with_confidence(self.config.confidence)
            .with_metadata("reason", json!(reason))
    }
}

impl Strategy for MovingAverageCrossStrategy {
    fn name(&self) -> &str {
        "ma_cross"
    }

    fn calculate_indicators(&mut self, view: &MarketView<'_>) -> StrategyResult<()> {
        self.fresh.clear();

        for symbol in self.target_symbols(view) {
            let Some(bars) = self.series(view, &symbol) else {
                continue;
            };
            let Some(last) = bars.last() else {
                continue;
            };

            let previous = self.indicators.get(&symbol);
            if previous.is_some_and(|s| s.bar_timestamp == last.timestamp) {
                continue;
            }

            let (Some(short), Some(long)) = (
                simple_moving_average(bars, self.config.short_period),
                simple_moving_average(bars, self.config.long_period),
            ) else {
                continue;
            };

            let prev = previous.map(|s| (s.short, s.long));
            self.indicators.insert(
                symbol.clone(),
                MaState {
                    short,
                    long,
                    prev,
                    close: last.close,
                    bar_timestamp: last.timestamp,
                },
            );
            self.fresh.insert(symbol);
        }

        Ok(())
    }

    fn generate_signals(&mut self, _view: &MarketView<'_>) -> StrategyResult<Vec<Signal>> {
        let mut signals = Vec::new();

        for symbol in &self.fresh {
            let Some(state) = self.indicators.get(symbol) else {
                continue;
            };
            let held = self.holdings.get(symbol).copied();

            if state.golden_cross() {
                debug!(symbol = %symbol, short = %state.short, long = %state.long, "골든 크로스");
                if let Some((PositionSide::Short, qty)) = held {
                    signals.push(self.exit(symbol, PositionSide::Short, qty, "golden_cross"));
                }
                if !matches!(held, Some((PositionSide::Long, _))) {
                    signals.push(self.entry(symbol, PositionSide::Long, state, "golden_cross"));
                }
            } else if state.death_cross() {
                debug!(symbol = %symbol, short = %state.short, long = %state.long, "데드 크로스");
                if let Some((PositionSide::Long, qty)) = held {
                    signals.push(self.exit(symbol, PositionSide::Long, qty, "death_cross"));
                }
                if self.config.allow_short && !matches!(held, Some((PositionSide::Short, _))) {
                    signals.push(self.entry(symbol, PositionSide::Short, state, "death_cross"));
                }
            }
        }

        Ok(signals)
    }

    fn on_fill(&mut self, fill: &Fill) {
        let side = fill.position_side();
        if fill.is_opening() {
            let entry = self
                .holdings
                .entry(fill.symbol.clone())
                .or_insert((side, Decimal::ZERO));
            entry.1 += fill.executed_qty;
        } else if let Some(entry) = self.holdings.get_mut(&fill.symbol) {
            entry.1 -= fill.executed_qty;
            if entry.1 <= Decimal::ZERO {
                self.holdings.remove(&fill.symbol);
            }
        }
    }

    fn get_state(&self) -> Value {
        json!({
            "indicators": self.indicators,
            "holdings": self.holdings,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use trader_core::{MarketDataSet, SeriesKey, SignalDirection};

    use super::*;

    fn data(prices: &[i64]) -> MarketDataSet {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = prices
            .iter()
            .enumerate()
            .map(|(i, p)| Bar::flat(start + Duration::days(i as i64), Decimal::from(*p), dec!(1)))
            .collect();
        MarketDataSet::new().with_series(SeriesKey::new("BTC", Timeframe::D1), bars)
    }

    fn run(strategy: &mut MovingAverageCrossStrategy, data: &MarketDataSet) -> Vec<Signal> {
        let mut all = Vec::new();
        for t in data.timeline() {
            let view = data.view_at(t);
            strategy.calculate_indicators(&view).unwrap();
            all.extend(strategy.generate_signals(&view).unwrap());
        }
        all
    }

    #[test]
    fn test_config_validation() {
        assert!(MaCrossConfig::default().validate().is_ok());
        assert!(matches!(
            MaCrossConfig::default().with_periods(20, 10).validate(),
            Err(MaCrossConfigError::InvalidPeriods { .. })
        ));
        assert!(matches!(
            MaCrossConfig::default().with_order_quantity(Decimal::ZERO).validate(),
            Err(MaCrossConfigError::InvalidQuantity(_))
        ));
        assert!(MovingAverageCrossStrategy::new(MaCrossConfig::default().with_periods(0, 3)).is_err());
    }

    #[test]
    fn test_golden_cross_opens_long_with_protection() {
        let config = MaCrossConfig::default().with_periods(2, 3);
        let mut strategy = MovingAverageCrossStrategy::new(config).unwrap();

        // 하락 후 반등: 마지막 캔들에서 단기 MA가 장기 MA 위로
        let signals = run(&mut strategy, &data(&[10, 9, 8, 7, 12]));

        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert_eq!(signal.direction, SignalDirection::OpenLong);
        assert_eq!(signal.requested_quantity, dec!(1));
        assert_eq!(signal.stop_loss, Some(dec!(11.4)));
        assert_eq!(signal.take_profit, Some(dec!(13.2)));
        assert_eq!(signal.reason(), Some("golden_cross"));
        assert_eq!(signal.confidence, 0.7);
    }

    #[test]
    fn test_death_cross_closes_held_long() {
        let config = MaCrossConfig::default().with_periods(2, 3);
        let mut strategy = MovingAverageCrossStrategy::new(config).unwrap();
        let data = data(&[10, 11, 12, 13, 8]);

        let timeline = data.timeline();
        let mut signals = Vec::new();
        for (i, t) in timeline.iter().enumerate() {
            let view = data.view_at(*t);
            strategy.calculate_indicators(&view).unwrap();
            if i == 3 {
                // 이미 롱 2개를 보유한 상태로 가정
                strategy.on_fill(&Fill {
                    timestamp: *t,
                    symbol: "BTC".to_string(),
                    side: SignalDirection::OpenLong.fill_side(),
                    direction: SignalDirection::OpenLong,
                    requested_qty: dec!(2),
                    executed_qty: dec!(2),
                    executed_price: dec!(13),
                    fee: Decimal::ZERO,
                    realized_pnl_component: Decimal::ZERO,
                    slippage_cost: Decimal::ZERO,
                    strategy_id: "ma_cross".to_string(),
                    reason: None,
                });
            }
            signals.extend(strategy.generate_signals(&view).unwrap());
        }

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].direction, SignalDirection::CloseLong);
        assert_eq!(signals[0].requested_quantity, dec!(2));
    }

    #[test]
    fn test_death_cross_opens_short_when_allowed() {
        let config = MaCrossConfig::default().with_periods(2, 3).with_short(true);
        let mut strategy = MovingAverageCrossStrategy::new(config).unwrap();

        let signals = run(&mut strategy, &data(&[10, 11, 12, 13, 8]));

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].direction, SignalDirection::OpenShort);
        assert_eq!(signals[0].stop_loss, Some(dec!(8.4)));
        assert_eq!(signals[0].take_profit, Some(dec!(7.2)));
    }

    #[test]
    fn test_carry_forward_step_does_not_repeat_signal() {
        let config = MaCrossConfig::default().with_periods(2, 3);
        let mut strategy = MovingAverageCrossStrategy::new(config).unwrap();
        let data = data(&[10, 9, 8, 7, 12]);
        let last = *data.timeline().last().unwrap();

        run(&mut strategy, &data);
        // 같은 캔들로 다시 호출해도 새 신호 없음
        let view = data.view_at(last + Duration::hours(1));
        strategy.calculate_indicators(&view).unwrap();
        assert!(strategy.generate_signals(&view).unwrap().is_empty());
    }
}
