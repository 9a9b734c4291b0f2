//! 포지션 크기 계산.

use rust_decimal::prelude::*;

/// Kelly 비율 상한 (25%).
pub const MAX_KELLY_FRACTION: f64 = 0.25;

/// 고정 리스크 수량.
///
/// 손절가까지 움직였을 때 손실이 `equity × risk_pct`가 되는 수량입니다.
/// 손절 거리가 0이거나 입력이 음수이면 `None`.
pub fn fixed_risk_quantity(
    equity: Decimal,
    risk_pct: Decimal,
    entry_price: Decimal,
    stop_price: Decimal,
) -> Option<Decimal> {
    if equity <= Decimal::ZERO || risk_pct <= Decimal::ZERO {
        return None;
    }
    let distance = (entry_price - stop_price).abs();
    if distance.is_zero() {
        return None;
    }
    Some(equity * risk_pct / distance)
}

/// Kelly 비율 `p - (1 - p) / b`, 0 ~ 25%로 제한.
///
/// `win_loss_ratio`는 평균 이익 / 평균 손실입니다.
pub fn kelly_fraction(win_rate: f64, win_loss_ratio: f64) -> f64 {
    if !win_rate.is_finite() || !win_loss_ratio.is_finite() || win_loss_ratio <= 0.0 {
        return 0.0;
    }
    let kelly = win_rate - (1.0 - win_rate) / win_loss_ratio;
    kelly.clamp(0.0, MAX_KELLY_FRACTION)
}

/// Kelly 비율에 따른 진입 수량.
pub fn kelly_quantity(
    equity: Decimal,
    price: Decimal,
    win_rate: f64,
    win_loss_ratio: f64,
) -> Decimal {
    if price <= Decimal::ZERO || equity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let fraction = Decimal::from_f64(kelly_fraction(win_rate, win_loss_ratio))
        .unwrap_or(Decimal::ZERO);
    equity * fraction / price
}
