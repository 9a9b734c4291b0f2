//! 전략의 트레이딩 시그널.
//!
//! 이 모듈은 전략이 생성하는 매매 신호 관련 타입을 정의합니다:
//! - `SignalDirection` - 신호 방향 (진입, 추가, 청산)
//! - `Signal` - 매매 신호 값 객체
//!
//! Signal은 한 시뮬레이션 스텝 동안만 존재하는 불변 값이며,
//! 엔진은 이를 읽기만 하고 수정하지 않습니다.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{PositionSide, Side};

/// 신호가 요청하는 포지션 변화.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalDirection {
    /// 롱 신규 진입
    OpenLong,
    /// 숏 신규 진입
    OpenShort,
    /// 롱 청산 (일부 또는 전체)
    CloseLong,
    /// 숏 청산 (일부 또는 전체)
    CloseShort,
    /// 기존 롱에 추가
    IncreaseLong,
    /// 기존 숏에 추가
    IncreaseShort,
}

impl SignalDirection {
    /// 대상 포지션 방향.
    pub fn position_side(self) -> PositionSide {
        match self {
            SignalDirection::OpenLong | SignalDirection::CloseLong | SignalDirection::IncreaseLong => {
                PositionSide::Long
            }
            SignalDirection::OpenShort
            | SignalDirection::CloseShort
            | SignalDirection::IncreaseShort => PositionSide::Short,
        }
    }

    /// 이 신호가 만들어내는 체결 방향.
    pub fn fill_side(self) -> Side {
        if self.is_closing() {
            self.position_side().exit_side()
        } else {
            self.position_side().entry_side()
        }
    }

    /// 신규 진입 여부 (Open*).
    pub fn is_open(self) -> bool {
        matches!(self, SignalDirection::OpenLong | SignalDirection::OpenShort)
    }

    /// 기존 포지션 추가 여부 (Increase*).
    pub fn is_increase(self) -> bool {
        matches!(
            self,
            SignalDirection::IncreaseLong | SignalDirection::IncreaseShort
        )
    }

    /// 익스포저를 늘리는 신호인지 (Open* 또는 Increase*).
    ///
    /// 리스크 차단 시 버려지는 신호이며, 현금 부족 시 전량 거부됩니다.
    pub fn is_opening(self) -> bool {
        self.is_open() || self.is_increase()
    }

    /// 익스포저를 줄이는 신호인지 (Close*).
    pub fn is_closing(self) -> bool {
        matches!(self, SignalDirection::CloseLong | SignalDirection::CloseShort)
    }

    /// 주어진 포지션 방향을 청산하는 방향.
    pub fn close_of(side: PositionSide) -> Self {
        match side {
            PositionSide::Long => SignalDirection::CloseLong,
            PositionSide::Short => SignalDirection::CloseShort,
        }
    }
}

impl std::fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalDirection::OpenLong => write!(f, "OPEN_LONG"),
            SignalDirection::OpenShort => write!(f, "OPEN_SHORT"),
            SignalDirection::CloseLong => write!(f, "CLOSE_LONG"),
            SignalDirection::CloseShort => write!(f, "CLOSE_SHORT"),
            SignalDirection::IncreaseLong => write!(f, "INCREASE_LONG"),
            SignalDirection::IncreaseShort => write!(f, "INCREASE_SHORT"),
        }
    }
}

/// 전략이 생성한 트레이딩 신호.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// 이 신호를 생성한 전략
    pub strategy_id: String,
    /// 거래 심볼
    pub symbol: String,
    /// 신호 방향
    pub direction: SignalDirection,
    /// 요청 수량
    pub requested_quantity: Decimal,
    /// 지정가 (이보다 불리한 체결가는 거부)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    /// 손절가
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    /// 익절가
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    /// 신호 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
    /// 추가 메타데이터
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Signal {
    /// 새 신호를 생성합니다.
    pub fn new(
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        direction: SignalDirection,
        requested_quantity: Decimal,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            direction,
            requested_quantity,
            limit_price: None,
            stop_loss: None,
            take_profit: None,
            confidence: 1.0,
            metadata: BTreeMap::new(),
        }
    }

    /// 롱 진입 신호.
    pub fn open_long(strategy_id: impl Into<String>, symbol: impl Into<String>, qty: Decimal) -> Self {
        Self::new(strategy_id, symbol, SignalDirection::OpenLong, qty)
    }

    /// 숏 진입 신호.
    pub fn open_short(
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        qty: Decimal,
    ) -> Self {
        Self::new(strategy_id, symbol, SignalDirection::OpenShort, qty)
    }

    /// 롱 청산 신호.
    pub fn close_long(
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        qty: Decimal,
    ) -> Self {
        Self::new(strategy_id, symbol, SignalDirection::CloseLong, qty)
    }

    /// 숏 청산 신호.
    pub fn close_short(
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        qty: Decimal,
    ) -> Self {
        Self::new(strategy_id, symbol, SignalDirection::CloseShort, qty)
    }

    /// 신뢰도를 설정합니다.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// 지정가를 설정합니다.
    pub fn with_limit_price(mut self, price: Decimal) -> Self {
        self.limit_price = Some(price);
        self
    }

    /// 손절/익절 가격을 설정합니다.
    pub fn with_protection(
        mut self,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }

    /// 메타데이터를 추가합니다.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// 메타데이터의 `reason` 문자열.
    pub fn reason(&self) -> Option<&str> {
        self.metadata.get("reason").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_direction_fill_side() {
        assert_eq!(SignalDirection::OpenLong.fill_side(), Side::Buy);
        assert_eq!(SignalDirection::IncreaseLong.fill_side(), Side::Buy);
        assert_eq!(SignalDirection::CloseLong.fill_side(), Side::Sell);
        assert_eq!(SignalDirection::OpenShort.fill_side(), Side::Sell);
        assert_eq!(SignalDirection::IncreaseShort.fill_side(), Side::Sell);
        assert_eq!(SignalDirection::CloseShort.fill_side(), Side::Buy);
    }

    #[test]
    fn test_opening_and_closing_are_disjoint() {
        let all = [
            SignalDirection::OpenLong,
            SignalDirection::OpenShort,
            SignalDirection::CloseLong,
            SignalDirection::CloseShort,
            SignalDirection::IncreaseLong,
            SignalDirection::IncreaseShort,
        ];
        for d in all {
            assert_ne!(d.is_opening(), d.is_closing(), "{d}");
        }
    }

    #[test]
    fn test_confidence_is_clamped() {
        let signal = Signal::open_long("s", "BTC", dec!(1)).with_confidence(1.7);
        assert_eq!(signal.confidence, 1.0);

        let signal = signal.with_confidence(-0.2);
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn test_reason_metadata() {
        let signal = Signal::close_long("s", "BTC", dec!(1))
            .with_metadata("reason", serde_json::json!("stop_loss"));
        assert_eq!(signal.reason(), Some("stop_loss"));
    }
}
