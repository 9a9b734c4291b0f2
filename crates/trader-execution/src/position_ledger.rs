//! 포지션 원장.
//!
//! 심볼별 포지션과 현금을 단일 소유자로 관리합니다.
//! 체결 적용 규칙:
//!
//! - 진입/추가: 가중 평균 진입가 재계산, `명목금액 / 레버리지 + 수수료`만큼 현금 차감
//! - 축소/청산: 진입가 유지, 실현 손익 `(체결가 - 진입가) × 수량` (숏은 부호 반전),
//!   증거금 비례 반환
//! - 수량이 정확히 0이 되면 포지션 제거
//!
//! 청산 수량 축소는 FillSimulator의 책임이며, 원장은 초과 청산을
//! 상위 로직 버그로 간주하여 `LedgerError::OversizedDecrease`로 거부합니다.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trader_core::{realized_pnl, Fill, Position, PositionSide, SignalDirection};

/// 원장 불변식 위반.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("초과 청산: {symbol} 요청 {requested}, 보유 {held}")]
    OversizedDecrease {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },
    #[error("포지션을 찾을 수 없음: {symbol}")]
    PositionNotFound { symbol: String },
    #[error("이미 포지션 존재: {symbol}")]
    PositionAlreadyOpen { symbol: String },
    #[error("포지션 방향 불일치: {symbol} 보유 {held}, 체결 {requested}")]
    SideMismatch {
        symbol: String,
        held: PositionSide,
        requested: PositionSide,
    },
    #[error("유효하지 않은 체결: {0}")]
    InvalidFill(String),
}

/// 원장 읽기 전용 뷰.
///
/// FillSimulator는 이 trait을 통해서만 현금과 포지션을 조회합니다.
pub trait LedgerView {
    /// 신규 진입에 사용할 수 있는 현금.
    fn cash_available(&self) -> Decimal;

    /// 심볼의 포지션.
    fn position(&self, symbol: &str) -> Option<&Position>;
}

/// 심볼별 포지션 원장.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionLedger {
    /// 현재 현금
    cash: Decimal,
    /// 초기 현금
    initial_cash: Decimal,
    /// 신규 포지션에 적용할 레버리지
    leverage: Decimal,
    /// 보유 포지션 (심볼 → 포지션), 결정적 순회를 위해 BTreeMap 사용
    positions: BTreeMap<String, Position>,
    /// 청산된 포지션을 포함한 누적 실현 손익
    realized_pnl_total: Decimal,
    /// 누적 수수료
    fees_total: Decimal,
}

impl PositionLedger {
    /// 새 원장 생성 (레버리지 1).
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            cash: initial_cash,
            initial_cash,
            leverage: Decimal::ONE,
            positions: BTreeMap::new(),
            realized_pnl_total: Decimal::ZERO,
            fees_total: Decimal::ZERO,
        }
    }

    /// 레버리지 설정.
    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = leverage;
        self
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn initial_cash(&self) -> Decimal {
        self.initial_cash
    }

    pub fn leverage(&self) -> Decimal {
        self.leverage
    }

    /// 포지션 조회.
    pub fn get(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// 보유 포지션 전체 (심볼 순).
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_flat(&self) -> bool {
        self.positions.is_empty()
    }

    /// 누적 실현 손익 (수수료 제외).
    pub fn realized_pnl_total(&self) -> Decimal {
        self.realized_pnl_total
    }

    /// 누적 수수료.
    pub fn fees_total(&self) -> Decimal {
        self.fees_total
    }

    /// 미실현 손익 합계.
    pub fn unrealized_pnl_total(&self) -> Decimal {
        self.positions.values().map(Position::unrealized_pnl).sum()
    }

    /// 보유 포지션 평가액 합계.
    pub fn total_position_value(&self) -> Decimal {
        self.positions.values().map(Position::market_value).sum()
    }

    /// 총 자산 (현금 + 포지션 평가액).
    pub fn equity(&self) -> Decimal {
        self.cash + self.total_position_value()
    }

    /// 현재가 반영.
    ///
    /// 진입가와 실현 손익은 변경하지 않습니다. 포지션이 있었으면 `true`.
    pub fn mark_to_market(&mut self, symbol: &str, price: Decimal) -> bool {
        match self.positions.get_mut(symbol) {
            Some(position) => {
                position.current_price = price;
                true
            }
            None => false,
        }
    }

    /// 체결을 원장에 적용합니다.
    ///
    /// 정확히 하나의 포지션을 생성/변경/제거합니다. 실패 시 원장은 변경되지 않습니다.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<(), LedgerError> {
        validate_fill(fill)?;

        match fill.direction {
            SignalDirection::OpenLong | SignalDirection::OpenShort => self.open(fill),
            SignalDirection::IncreaseLong | SignalDirection::IncreaseShort => self.increase(fill),
            SignalDirection::CloseLong | SignalDirection::CloseShort => self.decrease(fill),
        }
    }

    fn open(&mut self, fill: &Fill) -> Result<(), LedgerError> {
        if self.positions.contains_key(&fill.symbol) {
            return Err(LedgerError::PositionAlreadyOpen {
                symbol: fill.symbol.clone(),
            });
        }

        let margin = fill.notional() / self.leverage;
        self.cash -= margin + fill.fee;
        self.fees_total += fill.fee;

        self.positions.insert(
            fill.symbol.clone(),
            Position {
                symbol: fill.symbol.clone(),
                side: fill.position_side(),
                size: fill.executed_qty,
                entry_price: fill.executed_price,
                current_price: fill.executed_price,
                realized_pnl: Decimal::ZERO,
                leverage: self.leverage,
                margin,
                fees: fill.fee,
                opened_at: fill.timestamp,
                stop_loss: None,
                take_profit: None,
            },
        );

        Ok(())
    }

    fn increase(&mut self, fill: &Fill) -> Result<(), LedgerError> {
        let position = self.held_position_mut(fill)?;

        let new_size = position.size + fill.executed_qty;
        position.entry_price = (position.entry_price * position.size
            + fill.executed_price * fill.executed_qty)
            / new_size;
        position.size = new_size;

        let margin = fill.notional() / position.leverage;
        position.margin += margin;
        position.fees += fill.fee;

        self.cash -= margin + fill.fee;
        self.fees_total += fill.fee;

        Ok(())
    }

    fn decrease(&mut self, fill: &Fill) -> Result<(), LedgerError> {
        let position = self.held_position_mut(fill)?;

        if fill.executed_qty > position.size {
            return Err(LedgerError::OversizedDecrease {
                symbol: fill.symbol.clone(),
                requested: fill.executed_qty,
                held: position.size,
            });
        }

        let pnl = realized_pnl(
            position.entry_price,
            fill.executed_price,
            fill.executed_qty,
            position.side,
        );
        if pnl != fill.realized_pnl_component {
            return Err(LedgerError::InvalidFill(format!(
                "실현 손익 불일치: 체결 {}, 원장 {}",
                fill.realized_pnl_component, pnl
            )));
        }

        // 전량 청산은 잔여 증거금을 그대로 반환해 나눗셈 오차를 남기지 않음
        let released = if fill.executed_qty == position.size {
            position.margin
        } else {
            position.margin * fill.executed_qty / position.size
        };

        position.size -= fill.executed_qty;
        position.margin -= released;
        position.realized_pnl += pnl;
        position.fees += fill.fee;
        let closed = position.size.is_zero();

        self.cash += released + pnl - fill.fee;
        self.realized_pnl_total += pnl;
        self.fees_total += fill.fee;

        if closed {
            self.positions.remove(&fill.symbol);
        }

        Ok(())
    }

    fn held_position_mut(&mut self, fill: &Fill) -> Result<&mut Position, LedgerError> {
        let position =
            self.positions
                .get_mut(&fill.symbol)
                .ok_or_else(|| LedgerError::PositionNotFound {
                    symbol: fill.symbol.clone(),
                })?;

        if position.side != fill.position_side() {
            return Err(LedgerError::SideMismatch {
                symbol: fill.symbol.clone(),
                held: position.side,
                requested: fill.position_side(),
            });
        }

        Ok(position)
    }

    /// 포지션의 손절/익절가 설정.
    pub fn set_protection(
        &mut self,
        symbol: &str,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<(), LedgerError> {
        let position =
            self.positions
                .get_mut(symbol)
                .ok_or_else(|| LedgerError::PositionNotFound {
                    symbol: symbol.to_string(),
                })?;
        position.stop_loss = stop_loss;
        position.take_profit = take_profit;
        Ok(())
    }
}

impl LedgerView for PositionLedger {
    fn cash_available(&self) -> Decimal {
        self.cash
    }

    fn position(&self, symbol: &str) -> Option<&Position> {
        self.get(symbol)
    }
}

fn validate_fill(fill: &Fill) -> Result<(), LedgerError> {
    if fill.executed_qty <= Decimal::ZERO {
        return Err(LedgerError::InvalidFill(format!(
            "체결 수량은 0보다 커야 합니다: {}",
            fill.executed_qty
        )));
    }
    if fill.executed_price <= Decimal::ZERO {
        return Err(LedgerError::InvalidFill(format!(
            "체결 가격은 0보다 커야 합니다: {}",
            fill.executed_price
        )));
    }
    if fill.fee < Decimal::ZERO {
        return Err(LedgerError::InvalidFill(format!(
            "수수료는 음수일 수 없습니다: {}",
            fill.fee
        )));
    }
    if fill.side != fill.direction.fill_side() {
        return Err(LedgerError::InvalidFill(format!(
            "체결 방향 {}이(가) 신호 방향 {}과(와) 맞지 않습니다",
            fill.side, fill.direction
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use trader_core::Side;

    use super::*;

    fn fill(direction: SignalDirection, qty: Decimal, price: Decimal, fee: Decimal) -> Fill {
        Fill {
            timestamp: Utc::now(),
            symbol: "BTC".to_string(),
            side: direction.fill_side(),
            direction,
            requested_qty: qty,
            executed_qty: qty,
            executed_price: price,
            fee,
            realized_pnl_component: Decimal::ZERO,
            slippage_cost: Decimal::ZERO,
            strategy_id: "test".to_string(),
            reason: None,
        }
    }

    fn close(
        direction: SignalDirection,
        qty: Decimal,
        price: Decimal,
        fee: Decimal,
        pnl: Decimal,
    ) -> Fill {
        let mut f = fill(direction, qty, price, fee);
        f.realized_pnl_component = pnl;
        f
    }

    #[test]
    fn test_open_debits_notional_and_fee() {
        let mut ledger = PositionLedger::new(dec!(10000));
        ledger
            .apply_fill(&fill(SignalDirection::OpenLong, dec!(1), dec!(100), dec!(0.1)))
            .unwrap();

        assert_eq!(ledger.cash(), dec!(9899.9));
        let pos = ledger.get("BTC").unwrap();
        assert_eq!(pos.size, dec!(1));
        assert_eq!(pos.entry_price, dec!(100));
        assert_eq!(ledger.equity(), dec!(9999.9));
    }

    #[test]
    fn test_increase_recomputes_weighted_entry() {
        let mut ledger = PositionLedger::new(dec!(10000));
        ledger
            .apply_fill(&fill(SignalDirection::OpenLong, dec!(1), dec!(100), Decimal::ZERO))
            .unwrap();
        ledger
            .apply_fill(&fill(SignalDirection::IncreaseLong, dec!(3), dec!(120), Decimal::ZERO))
            .unwrap();

        let pos = ledger.get("BTC").unwrap();
        assert_eq!(pos.size, dec!(4));
        // (100×1 + 120×3) / 4 = 115
        assert_eq!(pos.entry_price, dec!(115));
        assert_eq!(ledger.cash(), dec!(9540));
    }

    #[test]
    fn test_partial_decrease_keeps_entry_price() {
        let mut ledger = PositionLedger::new(dec!(10000));
        ledger
            .apply_fill(&fill(SignalDirection::OpenLong, dec!(2), dec!(100), Decimal::ZERO))
            .unwrap();
        ledger
            .apply_fill(&close(
                SignalDirection::CloseLong,
                dec!(1),
                dec!(130),
                Decimal::ZERO,
                dec!(30),
            ))
            .unwrap();

        let pos = ledger.get("BTC").unwrap();
        assert_eq!(pos.size, dec!(1));
        assert_eq!(pos.entry_price, dec!(100));
        assert_eq!(pos.realized_pnl, dec!(30));
        assert_eq!(pos.margin, dec!(100));
        assert_eq!(ledger.cash(), dec!(9930));
    }

    #[test]
    fn test_full_close_removes_position() {
        let mut ledger = PositionLedger::new(dec!(10000));
        ledger
            .apply_fill(&fill(SignalDirection::OpenLong, dec!(1), dec!(100), dec!(0.1)))
            .unwrap();
        ledger.mark_to_market("BTC", dec!(110));
        assert_eq!(ledger.equity(), dec!(10009.9));

        ledger
            .apply_fill(&close(
                SignalDirection::CloseLong,
                dec!(1),
                dec!(110),
                dec!(0.11),
                dec!(10),
            ))
            .unwrap();

        assert!(ledger.get("BTC").is_none());
        assert_eq!(ledger.cash(), dec!(10009.79));
        assert_eq!(ledger.realized_pnl_total(), dec!(10));
        assert_eq!(ledger.fees_total(), dec!(0.21));
    }

    #[test]
    fn test_short_round_trip() {
        let mut ledger = PositionLedger::new(dec!(1000));
        ledger
            .apply_fill(&fill(SignalDirection::OpenShort, dec!(2), dec!(100), Decimal::ZERO))
            .unwrap();
        assert_eq!(ledger.cash(), dec!(800));

        ledger.mark_to_market("BTC", dec!(90));
        assert_eq!(ledger.equity(), dec!(1020));

        ledger
            .apply_fill(&close(
                SignalDirection::CloseShort,
                dec!(2),
                dec!(90),
                Decimal::ZERO,
                dec!(20),
            ))
            .unwrap();
        assert!(ledger.is_flat());
        assert_eq!(ledger.cash(), dec!(1020));
    }

    #[test]
    fn test_leveraged_open_locks_margin_only() {
        let mut ledger = PositionLedger::new(dec!(1000)).with_leverage(dec!(4));
        ledger
            .apply_fill(&fill(SignalDirection::OpenLong, dec!(10), dec!(100), Decimal::ZERO))
            .unwrap();

        assert_eq!(ledger.cash(), dec!(750));
        ledger.mark_to_market("BTC", dec!(101));
        // 증거금 250 + 미실현 10
        assert_eq!(ledger.equity(), dec!(1010));
    }

    #[test]
    fn test_oversized_decrease_is_rejected_without_mutation() {
        let mut ledger = PositionLedger::new(dec!(10000));
        ledger
            .apply_fill(&fill(SignalDirection::OpenLong, dec!(1), dec!(100), Decimal::ZERO))
            .unwrap();
        let before = ledger.clone();

        let err = ledger
            .apply_fill(&close(
                SignalDirection::CloseLong,
                dec!(2),
                dec!(100),
                Decimal::ZERO,
                Decimal::ZERO,
            ))
            .unwrap_err();

        assert!(matches!(err, LedgerError::OversizedDecrease { .. }));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_decrease_on_missing_or_opposite_position() {
        let mut ledger = PositionLedger::new(dec!(10000));
        let err = ledger
            .apply_fill(&close(
                SignalDirection::CloseLong,
                dec!(1),
                dec!(100),
                Decimal::ZERO,
                Decimal::ZERO,
            ))
            .unwrap_err();
        assert!(matches!(err, LedgerError::PositionNotFound { .. }));

        ledger
            .apply_fill(&fill(SignalDirection::OpenShort, dec!(1), dec!(100), Decimal::ZERO))
            .unwrap();
        let err = ledger
            .apply_fill(&close(
                SignalDirection::CloseLong,
                dec!(1),
                dec!(100),
                Decimal::ZERO,
                Decimal::ZERO,
            ))
            .unwrap_err();
        assert!(matches!(err, LedgerError::SideMismatch { .. }));
    }

    #[test]
    fn test_mismatched_side_and_pnl_are_invalid() {
        let mut ledger = PositionLedger::new(dec!(10000));
        let mut bad = fill(SignalDirection::OpenLong, dec!(1), dec!(100), Decimal::ZERO);
        bad.side = Side::Sell;
        assert!(matches!(
            ledger.apply_fill(&bad),
            Err(LedgerError::InvalidFill(_))
        ));

        ledger
            .apply_fill(&fill(SignalDirection::OpenLong, dec!(1), dec!(100), Decimal::ZERO))
            .unwrap();
        let wrong_pnl = close(
            SignalDirection::CloseLong,
            dec!(1),
            dec!(110),
            Decimal::ZERO,
            dec!(999),
        );
        assert!(matches!(
            ledger.apply_fill(&wrong_pnl),
            Err(LedgerError::InvalidFill(_))
        ));
    }

    #[test]
    fn test_mark_to_market_only_touches_current_price() {
        let mut ledger = PositionLedger::new(dec!(10000));
        assert!(!ledger.mark_to_market("BTC", dec!(1)));

        ledger
            .apply_fill(&fill(SignalDirection::OpenLong, dec!(1), dec!(100), Decimal::ZERO))
            .unwrap();
        assert!(ledger.mark_to_market("BTC", dec!(90)));

        let pos = ledger.get("BTC").unwrap();
        assert_eq!(pos.entry_price, dec!(100));
        assert_eq!(pos.realized_pnl, Decimal::ZERO);
        assert_eq!(pos.unrealized_pnl(), dec!(-10));
    }

    proptest! {
        #[test]
        fn prop_round_trip_is_equity_neutral(
            qty in 1u32..1_000,
            price in 1u32..100_000,
        ) {
            let qty = Decimal::from(qty);
            let price = Decimal::from(price);
            let mut ledger = PositionLedger::new(dec!(1_000_000_000));

            ledger.apply_fill(&fill(SignalDirection::OpenLong, qty, price, Decimal::ZERO)).unwrap();
            ledger.apply_fill(&close(SignalDirection::CloseLong, qty, price, Decimal::ZERO, Decimal::ZERO)).unwrap();

            prop_assert!(ledger.is_flat());
            prop_assert_eq!(ledger.equity(), dec!(1_000_000_000));
        }
    }
}
