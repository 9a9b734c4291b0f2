//! 체결 시뮬레이터.
//!
//! 신호 하나와 현재 시장가를 받아 결정적인 체결 결과 하나를 만듭니다.
//! 호가 깊이, 지연, 부분 체결은 모델링하지 않습니다.
//!
//! # 규칙
//!
//! - 슬리피지: 매수는 `가격 × (1 + slippage_rate)`, 매도는 `가격 × (1 - slippage_rate)`
//! - 진입/추가: `명목금액 / 레버리지 + 수수료`가 현금보다 크면 전량 거부
//! - 청산: 보유 수량으로 축소 (`Clamped`), 포지션이 없으면 거부
//! - 지정가: 슬리피지 적용가가 지정가보다 불리하면 거부
//!
//! 시뮬레이터는 원장을 읽기만 하며 절대 변경하지 않습니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::{realized_pnl, Fill, FillOutcome, RejectReason, Side, Signal};

use crate::position_ledger::LedgerView;

/// 방향별 슬리피지 적용.
pub fn apply_slippage(price: Decimal, slippage_rate: Decimal, side: Side) -> Decimal {
    let slippage = price * slippage_rate;
    match side {
        Side::Buy => price + slippage,
        Side::Sell => price - slippage,
    }
}

/// 진입에 필요한 자금 검증.
///
/// 통과하면 `(수수료, 필요 증거금)`을 반환합니다.
pub fn validate_funds(
    notional: Decimal,
    fee_rate: Decimal,
    leverage: Decimal,
    cash_available: Decimal,
) -> Result<(Decimal, Decimal), RejectReason> {
    let fee = notional * fee_rate;
    let margin = notional / leverage;
    let required = margin + fee;
    if required > cash_available {
        return Err(RejectReason::InsufficientCash {
            required,
            available: cash_available,
        });
    }
    Ok((fee, margin))
}

/// 체결 시뮬레이터 설정.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillSimulator {
    /// 수수료율 (예: 0.001 = 0.1%)
    pub fee_rate: Decimal,
    /// 슬리피지율 (예: 0.0005 = 0.05%)
    pub slippage_rate: Decimal,
    /// 레버리지
    pub leverage: Decimal,
}

impl Default for FillSimulator {
    fn default() -> Self {
        Self {
            fee_rate: Decimal::new(1, 3),
            slippage_rate: Decimal::new(5, 4),
            leverage: Decimal::ONE,
        }
    }
}

impl FillSimulator {
    pub fn new(fee_rate: Decimal, slippage_rate: Decimal) -> Self {
        Self {
            fee_rate,
            slippage_rate,
            leverage: Decimal::ONE,
        }
    }

    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = leverage;
        self
    }

    /// 신호를 시뮬레이션 체결합니다.
    pub fn execute(
        &self,
        signal: &Signal,
        market_price: Decimal,
        ledger: &impl LedgerView,
        timestamp: DateTime<Utc>,
    ) -> FillOutcome {
        if signal.requested_quantity <= Decimal::ZERO {
            return FillOutcome::Rejected(RejectReason::InvalidQuantity {
                quantity: signal.requested_quantity,
            });
        }
        if market_price <= Decimal::ZERO {
            return FillOutcome::Rejected(RejectReason::InvalidPrice {
                price: market_price,
            });
        }

        let side = signal.direction.fill_side();
        let executed_price = apply_slippage(market_price, self.slippage_rate, side);
        if executed_price <= Decimal::ZERO {
            return FillOutcome::Rejected(RejectReason::InvalidPrice {
                price: executed_price,
            });
        }

        if let Some(limit) = signal.limit_price {
            let worse = match side {
                Side::Buy => executed_price > limit,
                Side::Sell => executed_price < limit,
            };
            if worse {
                return FillOutcome::Rejected(RejectReason::LimitNotReached {
                    limit,
                    price: executed_price,
                });
            }
        }

        let outcome = if signal.direction.is_opening() {
            self.execute_opening(signal, executed_price, ledger)
        } else {
            self.execute_closing(signal, executed_price, ledger)
        };

        outcome.map_or_else(FillOutcome::Rejected, |(executed_qty, fee, pnl)| {
            let fill = Fill {
                timestamp,
                symbol: signal.symbol.clone(),
                side,
                direction: signal.direction,
                requested_qty: signal.requested_quantity,
                executed_qty,
                executed_price,
                fee,
                realized_pnl_component: pnl,
                slippage_cost: (executed_price - market_price).abs() * executed_qty,
                strategy_id: signal.strategy_id.clone(),
                reason: signal.reason().map(str::to_string),
            };
            if executed_qty < signal.requested_quantity {
                FillOutcome::Clamped(fill, signal.requested_quantity)
            } else {
                FillOutcome::Filled(fill)
            }
        })
    }

    /// 진입/추가: 전량 체결 또는 전량 거부.
    fn execute_opening(
        &self,
        signal: &Signal,
        executed_price: Decimal,
        ledger: &impl LedgerView,
    ) -> Result<(Decimal, Decimal, Decimal), RejectReason> {
        let target_side = signal.direction.position_side();
        match (ledger.position(&signal.symbol), signal.direction.is_open()) {
            (Some(held), _) if held.side != target_side => {
                return Err(RejectReason::SideMismatch {
                    symbol: signal.symbol.clone(),
                    held: held.side,
                })
            }
            (Some(_), true) => {
                return Err(RejectReason::PositionExists {
                    symbol: signal.symbol.clone(),
                })
            }
            (None, false) => {
                return Err(RejectReason::NoPosition {
                    symbol: signal.symbol.clone(),
                })
            }
            _ => {}
        }

        let notional = executed_price * signal.requested_quantity;
        let (fee, _) = validate_funds(
            notional,
            self.fee_rate,
            self.leverage,
            ledger.cash_available(),
        )?;

        Ok((signal.requested_quantity, fee, Decimal::ZERO))
    }

    /// 청산: 보유 수량으로 축소.
    fn execute_closing(
        &self,
        signal: &Signal,
        executed_price: Decimal,
        ledger: &impl LedgerView,
    ) -> Result<(Decimal, Decimal, Decimal), RejectReason> {
        let held = ledger
            .position(&signal.symbol)
            .ok_or_else(|| RejectReason::NoPosition {
                symbol: signal.symbol.clone(),
            })?;

        if held.side != signal.direction.position_side() {
            return Err(RejectReason::SideMismatch {
                symbol: signal.symbol.clone(),
                held: held.side,
            });
        }

        let executed_qty = signal.requested_quantity.min(held.size);
        let fee = executed_price * executed_qty * self.fee_rate;
        let pnl = realized_pnl(held.entry_price, executed_price, executed_qty, held.side);

        Ok((executed_qty, fee, pnl))
    }
}
