//! 보호 청산 스캔.
//!
//! 현재가가 반영된 포지션에서 손절/익절 도달 여부를 확인하고
//! 청산 신호를 만듭니다. 손절과 익절이 동시에 도달하면 손절이 우선합니다.

use serde::{Deserialize, Serialize};
use trader_core::{Position, Signal, SignalDirection};

/// 보호 청산 전략 ID.
pub const PROTECTIVE_STRATEGY_ID: &str = "risk";

/// 보호 청산 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitTrigger {
    StopLoss,
    TakeProfit,
    /// 리스크 한도 도달에 의한 전량 청산
    RiskHalt,
}

impl ExitTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitTrigger::StopLoss => "stop_loss",
            ExitTrigger::TakeProfit => "take_profit",
            ExitTrigger::RiskHalt => "risk_halt",
        }
    }
}

fn exit_signal(position: &Position, trigger: ExitTrigger) -> Signal {
    Signal::new(
        PROTECTIVE_STRATEGY_ID,
        position.symbol.clone(),
        SignalDirection::close_of(position.side),
        position.size,
    )
    .with_metadata("reason", serde_json::json!(trigger.as_str()))
}

/// 손절/익절에 도달한 포지션의 전량 청산 신호.
pub fn protective_exits<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Vec<Signal> {
    positions
        .into_iter()
        .filter_map(|position| {
            if position.stop_loss_hit() {
                Some(exit_signal(position, ExitTrigger::StopLoss))
            } else if position.take_profit_hit() {
                Some(exit_signal(position, ExitTrigger::TakeProfit))
            } else {
                None
            }
        })
        .collect()
}

/// 보유 포지션 전량 청산 신호 (`HaltPolicy::Flatten`).
pub fn flatten_signals<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Vec<Signal> {
    positions
        .into_iter()
        .map(|position| exit_signal(position, ExitTrigger::RiskHalt))
        .collect()
}
