//! 자산 곡선 추적.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::EquityPoint;
use trader_execution::PositionLedger;

/// 자산 곡선과 최고점 추적기.
///
/// 스냅샷은 `현금 + 포지션 평가액`을 기록합니다.
/// 최고점은 단조 증가하며 낙폭은 항상 `[0, 1]` 범위입니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityTracker {
    points: Vec<EquityPoint>,
    peak: Decimal,
}

impl EquityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 원장 상태로 스냅샷을 기록합니다.
    pub fn snapshot(&mut self, timestamp: DateTime<Utc>, ledger: &PositionLedger) -> EquityPoint {
        let point = EquityPoint::new(timestamp, ledger.cash() + ledger.total_position_value());
        self.record(point);
        point
    }

    /// 계산된 자산 값을 그대로 기록합니다.
    pub fn record(&mut self, point: EquityPoint) {
        if self.points.is_empty() || point.equity > self.peak {
            self.peak = point.equity;
        }
        self.points.push(point);
    }

    /// 지금까지의 최고 자산.
    pub fn peak(&self) -> Decimal {
        self.peak
    }

    pub fn latest(&self) -> Option<&EquityPoint> {
        self.points.last()
    }

    /// 현재 낙폭 `(peak - latest) / peak`.
    ///
    /// 기록이 없거나 최고점이 0 이하이면 0.
    pub fn drawdown_now(&self) -> Decimal {
        let Some(latest) = self.latest() else {
            return Decimal::ZERO;
        };
        if self.peak <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let drawdown = (self.peak - latest.equity) / self.peak;
        drawdown.clamp(Decimal::ZERO, Decimal::ONE)
    }

    pub fn points(&self) -> &[EquityPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_points(self) -> Vec<EquityPoint> {
        self.points
    }
}
