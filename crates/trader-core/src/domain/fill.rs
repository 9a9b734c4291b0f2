//! 체결 기록과 체결 시뮬레이션 결과.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{PositionSide, Side, SignalDirection};

/// 시그널 하나를 시뮬레이션 체결한 결과.
///
/// FillSimulator가 한 번 생성한 뒤로는 변경되지 않으며,
/// 시뮬레이션 루프가 소유한 체결 로그에 순서대로 추가됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// 체결 시각
    pub timestamp: DateTime<Utc>,
    /// 심볼
    pub symbol: String,
    /// 체결 방향 (매수/매도)
    pub side: Side,
    /// 원 신호 방향
    pub direction: SignalDirection,
    /// 요청 수량
    pub requested_qty: Decimal,
    /// 체결 수량
    pub executed_qty: Decimal,
    /// 슬리피지 적용 체결가
    pub executed_price: Decimal,
    /// 수수료
    pub fee: Decimal,
    /// 이 체결로 실현된 손익 (수수료 제외, 청산 체결만 0이 아님)
    pub realized_pnl_component: Decimal,
    /// 슬리피지 비용 (|체결가 - 시장가| × 수량)
    #[serde(default)]
    pub slippage_cost: Decimal,
    /// 신호를 만든 전략
    #[serde(default)]
    pub strategy_id: String,
    /// 체결 사유 (손절, 리스크 청산 등)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Fill {
    /// 체결 금액 (체결가 × 체결 수량).
    pub fn notional(&self) -> Decimal {
        self.executed_price * self.executed_qty
    }

    /// 대상 포지션 방향.
    pub fn position_side(&self) -> PositionSide {
        self.direction.position_side()
    }

    /// 포지션을 줄이는 체결인지.
    pub fn is_closing(&self) -> bool {
        self.direction.is_closing()
    }

    /// 포지션을 늘리는 체결인지.
    pub fn is_opening(&self) -> bool {
        self.direction.is_opening()
    }

    /// 수익 청산 여부.
    pub fn is_win(&self) -> bool {
        self.is_closing() && self.realized_pnl_component > Decimal::ZERO
    }

    /// 손실 청산 여부.
    pub fn is_loss(&self) -> bool {
        self.is_closing() && self.realized_pnl_component < Decimal::ZERO
    }

    /// 수수료 차감 후 손익 기여분.
    pub fn net_pnl(&self) -> Decimal {
        self.realized_pnl_component - self.fee
    }
}

/// 체결 거부 사유.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("자금 부족: 필요 {required}, 보유 {available}")]
    InsufficientCash {
        required: Decimal,
        available: Decimal,
    },
    #[error("포지션 없음: {symbol}")]
    NoPosition { symbol: String },
    #[error("이미 포지션 존재: {symbol}")]
    PositionExists { symbol: String },
    #[error("포지션 방향 불일치: {symbol} 보유 방향 {held}")]
    SideMismatch { symbol: String, held: PositionSide },
    #[error("유효하지 않은 수량: {quantity}")]
    InvalidQuantity { quantity: Decimal },
    #[error("유효하지 않은 가격: {price}")]
    InvalidPrice { price: Decimal },
    #[error("지정가 미도달: 지정가 {limit}, 체결가 {price}")]
    LimitNotReached { limit: Decimal, price: Decimal },
}

/// 체결 시뮬레이션 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillOutcome {
    /// 요청 수량 전량 체결
    Filled(Fill),
    /// 체결 거부 (원장 변경 없음)
    Rejected(RejectReason),
    /// 보유 수량으로 축소 체결 (두 번째 값은 원래 요청 수량)
    Clamped(Fill, Decimal),
}

impl FillOutcome {
    /// 체결이 발생했다면 그 체결.
    pub fn fill(&self) -> Option<&Fill> {
        match self {
            FillOutcome::Filled(fill) | FillOutcome::Clamped(fill, _) => Some(fill),
            FillOutcome::Rejected(_) => None,
        }
    }

    pub fn into_fill(self) -> Option<Fill> {
        match self {
            FillOutcome::Filled(fill) | FillOutcome::Clamped(fill, _) => Some(fill),
            FillOutcome::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, FillOutcome::Rejected(_))
    }
}
