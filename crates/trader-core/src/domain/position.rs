//! 포지션 엔티티와 손익 계산.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::PositionSide;

/// 미실현 손익 계산.
///
/// 롱: `(현재가 - 진입가) × 수량`, 숏: 그 부호 반전.
pub fn unrealized_pnl(
    entry_price: Decimal,
    current_price: Decimal,
    quantity: Decimal,
    side: PositionSide,
) -> Decimal {
    match side {
        PositionSide::Long => (current_price - entry_price) * quantity,
        PositionSide::Short => (entry_price - current_price) * quantity,
    }
}

/// 청산 체결의 실현 손익 (수수료 제외).
pub fn realized_pnl(
    entry_price: Decimal,
    fill_price: Decimal,
    quantity: Decimal,
    side: PositionSide,
) -> Decimal {
    unrealized_pnl(entry_price, fill_price, quantity, side)
}

/// 심볼별 단일 포지션.
///
/// PositionLedger가 독점 소유하며, 수량이 정확히 0이 되는 순간 원장에서 제거됩니다.
/// 미실현 손익은 저장하지 않고 `current_price`로부터 매번 계산합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 심볼
    pub symbol: String,
    /// 방향
    pub side: PositionSide,
    /// 보유 수량 (항상 양수)
    pub size: Decimal,
    /// 가중 평균 진입가
    pub entry_price: Decimal,
    /// 최근 평가 가격
    pub current_price: Decimal,
    /// 누적 실현 손익 (수수료 제외)
    pub realized_pnl: Decimal,
    /// 레버리지
    pub leverage: Decimal,
    /// 묶인 증거금
    pub margin: Decimal,
    /// 누적 수수료
    pub fees: Decimal,
    /// 최초 진입 시각
    pub opened_at: DateTime<Utc>,
    /// 손절가
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    /// 익절가
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
}

impl Position {
    /// 미실현 손익.
    pub fn unrealized_pnl(&self) -> Decimal {
        unrealized_pnl(self.entry_price, self.current_price, self.size, self.side)
    }

    /// 미실현 손익률 (진입 금액 대비, 소수).
    pub fn unrealized_pnl_pct(&self) -> Decimal {
        let cost = self.entry_price * self.size;
        if cost.is_zero() {
            return Decimal::ZERO;
        }
        self.unrealized_pnl() / cost
    }

    /// 현재가 기준 명목 금액.
    pub fn notional(&self) -> Decimal {
        self.size * self.current_price
    }

    /// 포지션 평가액 (증거금 + 미실현 손익).
    ///
    /// 레버리지 1의 롱에서는 `size × current_price`와 같습니다.
    pub fn market_value(&self) -> Decimal {
        self.margin + self.unrealized_pnl()
    }

    /// 손절가 도달 여부.
    pub fn stop_loss_hit(&self) -> bool {
        match (self.stop_loss, self.side) {
            (Some(sl), PositionSide::Long) => self.current_price <= sl,
            (Some(sl), PositionSide::Short) => self.current_price >= sl,
            (None, _) => false,
        }
    }

    /// 익절가 도달 여부.
    pub fn take_profit_hit(&self) -> bool {
        match (self.take_profit, self.side) {
            (Some(tp), PositionSide::Long) => self.current_price >= tp,
            (Some(tp), PositionSide::Short) => self.current_price <= tp,
            (None, _) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;

    fn position(side: PositionSide, current: Decimal) -> Position {
        Position {
            symbol: "BTC".to_string(),
            side,
            size: dec!(2),
            entry_price: dec!(100),
            current_price: current,
            realized_pnl: Decimal::ZERO,
            leverage: Decimal::ONE,
            margin: dec!(200),
            fees: Decimal::ZERO,
            opened_at: Utc::now(),
            stop_loss: Some(dec!(90)),
            take_profit: Some(dec!(120)),
        }
    }

    #[test]
    fn test_long_valuation_matches_notional() {
        let pos = position(PositionSide::Long, dec!(110));
        assert_eq!(pos.unrealized_pnl(), dec!(20));
        assert_eq!(pos.market_value(), pos.notional());
        assert_eq!(pos.unrealized_pnl_pct(), dec!(0.1));
    }

    #[test]
    fn test_short_valuation() {
        let pos = position(PositionSide::Short, dec!(110));
        assert_eq!(pos.unrealized_pnl(), dec!(-20));
        assert_eq!(pos.market_value(), dec!(180));
    }

    #[test]
    fn test_protective_levels() {
        let long = position(PositionSide::Long, dec!(89));
        assert!(long.stop_loss_hit());
        assert!(!long.take_profit_hit());

        let mut short = position(PositionSide::Short, dec!(89));
        short.stop_loss = Some(dec!(110));
        short.take_profit = Some(dec!(90));
        assert!(!short.stop_loss_hit());
        assert!(short.take_profit_hit());
    }
}
