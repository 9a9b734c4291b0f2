//! 실시간 구동용 공유 원장.
//!
//! 여러 심볼/전략 태스크가 같은 원장을 호출할 때 모든 변경을
//! 하나의 `tokio::sync::Mutex`로 직렬화합니다. 읽기는 복제된 스냅샷으로 합니다.
//!
//! 이미 적용된 체결은 절대 조용히 되돌리지 않습니다.
//! 되돌리려면 [`SharedLedger::compensate`]로 반대 방향 체결을 명시적으로 적용합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use trader_core::{realized_pnl, Fill, FillOutcome, PositionSide, Signal, SignalDirection};

use crate::fill_simulator::FillSimulator;
use crate::position_ledger::{LedgerError, PositionLedger};

/// 직렬화된 단일 작성자 원장 핸들.
#[derive(Debug, Clone)]
pub struct SharedLedger {
    inner: Arc<Mutex<PositionLedger>>,
}

impl SharedLedger {
    pub fn new(ledger: PositionLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    /// 체결 적용.
    pub async fn apply_fill(&self, fill: &Fill) -> Result<(), LedgerError> {
        let mut ledger = self.inner.lock().await;
        ledger.apply_fill(fill)
    }

    /// 현재가 반영.
    pub async fn mark_to_market(&self, symbol: &str, price: Decimal) -> bool {
        let mut ledger = self.inner.lock().await;
        ledger.mark_to_market(symbol, price)
    }

    /// 읽기 전용 스냅샷.
    pub async fn snapshot(&self) -> PositionLedger {
        self.inner.lock().await.clone()
    }

    pub async fn equity(&self) -> Decimal {
        self.inner.lock().await.equity()
    }

    /// 체결 시뮬레이션과 원장 적용을 한 번의 잠금 안에서 수행합니다.
    ///
    /// 현금 확인과 차감 사이에 다른 작성자가 끼어들 수 없습니다.
    pub async fn execute(
        &self,
        simulator: &FillSimulator,
        signal: &Signal,
        market_price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<FillOutcome, LedgerError> {
        let mut ledger = self.inner.lock().await;
        let outcome = simulator.execute(signal, market_price, &*ledger, timestamp);

        match &outcome {
            FillOutcome::Filled(fill) | FillOutcome::Clamped(fill, _) => {
                ledger.apply_fill(fill)?;
                if signal.direction.is_open()
                    && (signal.stop_loss.is_some() || signal.take_profit.is_some())
                {
                    ledger.set_protection(&signal.symbol, signal.stop_loss, signal.take_profit)?;
                }
                debug!(
                    symbol = %fill.symbol,
                    direction = %fill.direction,
                    qty = %fill.executed_qty,
                    price = %fill.executed_price,
                    "실시간 체결 적용"
                );
            }
            FillOutcome::Rejected(reason) => {
                debug!(symbol = %signal.symbol, reason = %reason, "실시간 체결 거부");
            }
        }

        Ok(outcome)
    }

    /// 적용된 체결을 상쇄하는 반대 방향 체결을 적용하고 그 체결을 반환합니다.
    ///
    /// 상쇄 체결은 원 체결가로 수수료 없이 기록되며, 호출자가 체결 로그에 추가해야 합니다.
    ///
    /// 자산(현금 + 포지션 가치)과 수량은 원래대로 돌아가지만 진입가는 복원되지 않습니다.
    /// `Increase*` 체결의 상쇄는 부분 청산이므로 가중 평균된 진입가가 그대로 남고,
    /// 부분 청산의 상쇄는 `Increase*`이므로 원 체결가가 진입가에 다시 섞입니다.
    pub async fn compensate(
        &self,
        original: &Fill,
        timestamp: DateTime<Utc>,
    ) -> Result<Fill, LedgerError> {
        let mut ledger = self.inner.lock().await;
        let side = original.position_side();

        let (direction, pnl) = if original.is_opening() {
            let held = ledger
                .get(&original.symbol)
                .ok_or_else(|| LedgerError::PositionNotFound {
                    symbol: original.symbol.clone(),
                })?;
            let pnl = realized_pnl(
                held.entry_price,
                original.executed_price,
                original.executed_qty,
                side,
            );
            (SignalDirection::close_of(side), pnl)
        } else if ledger.get(&original.symbol).is_some() {
            let direction = match side {
                PositionSide::Long => SignalDirection::IncreaseLong,
                PositionSide::Short => SignalDirection::IncreaseShort,
            };
            (direction, Decimal::ZERO)
        } else {
            let direction = match side {
                PositionSide::Long => SignalDirection::OpenLong,
                PositionSide::Short => SignalDirection::OpenShort,
            };
            (direction, Decimal::ZERO)
        };

        let fill = Fill {
            timestamp,
            symbol: original.symbol.clone(),
            side: direction.fill_side(),
            direction,
            requested_qty: original.executed_qty,
            executed_qty: original.executed_qty,
            executed_price: original.executed_price,
            fee: Decimal::ZERO,
            realized_pnl_component: pnl,
            slippage_cost: Decimal::ZERO,
            strategy_id: original.strategy_id.clone(),
            reason: Some("compensation".to_string()),
        };

        if let Err(e) = ledger.apply_fill(&fill) {
            warn!(symbol = %fill.symbol, error = %e, "상쇄 체결 적용 실패");
            return Err(e);
        }

        Ok(fill)
    }
}
