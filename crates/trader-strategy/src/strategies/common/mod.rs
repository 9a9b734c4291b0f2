//! 전략 공통 지표.

use rust_decimal::Decimal;
use trader_core::Bar;

/// 최근 `period`개 종가의 단순 이동평균.
///
/// 캔들이 부족하거나 `period`가 0이면 `None`.
pub fn simple_moving_average(bars: &[Bar], period: usize) -> Option<Decimal> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let sum: Decimal = bars[bars.len() - period..].iter().map(|b| b.close).sum();
    Some(sum / Decimal::from(period))
}
