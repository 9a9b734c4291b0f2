//! 서킷 브레이커.
//!
//! `RiskGovernor`는 순수 평가기입니다. 자산 곡선과 체결 로그를 받아
//! `RiskState`를 계산하고, 설정된 한도 중 하나라도 도달했는지 판정합니다.
//! 포지션을 직접 청산하지 않으며, 청산 여부는 호출자가 `HaltPolicy`에 따라 결정합니다.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::{EquityPoint, Fill};

use crate::config::{HaltPolicy, RiskLimits};

/// 한도 위반 사유.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskBreach {
    /// 최대 낙폭 도달
    MaxDrawdown { drawdown: Decimal, limit: Decimal },
    /// 일일 손실 한도 도달
    DailyLoss { loss_pct: Decimal, limit: Decimal },
    /// 연속 손실 한도 도달
    ConsecutiveLosses { count: u32, limit: u32 },
    /// 거래 빈도 한도 도달
    TradeFrequency { count: u32, limit: u32 },
}

impl std::fmt::Display for RiskBreach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskBreach::MaxDrawdown { drawdown, limit } => {
                write!(f, "최대 낙폭 도달: {drawdown} >= {limit}")
            }
            RiskBreach::DailyLoss { loss_pct, limit } => {
                write!(f, "일일 손실 한도 도달: {loss_pct} >= {limit}")
            }
            RiskBreach::ConsecutiveLosses { count, limit } => {
                write!(f, "연속 손실 한도 도달: {count} >= {limit}")
            }
            RiskBreach::TradeFrequency { count, limit } => {
                write!(f, "거래 빈도 한도 도달: {count} >= {limit}")
            }
        }
    }
}

/// 자산 곡선과 체결 로그에서 파생된 리스크 상태.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// 지금까지의 최고 자산
    pub peak_equity: Decimal,
    /// 최근 자산
    pub current_equity: Decimal,
    /// 현재 낙폭 (0 ~ 1)
    pub current_drawdown: Decimal,
    /// 당일 실현 손익 (수수료 차감)
    pub daily_realized_pnl: Decimal,
    /// 당일 시작 자산
    pub day_start_equity: Decimal,
    /// 연속 손실 청산 횟수
    pub consecutive_losses: u32,
    /// 빈도 윈도우 내 체결 수
    pub trades_in_window: u32,
}

impl RiskState {
    /// 당일 손실률 (이익이면 0).
    pub fn daily_loss_pct(&self) -> Decimal {
        if self.day_start_equity <= Decimal::ZERO || self.daily_realized_pnl >= Decimal::ZERO {
            return Decimal::ZERO;
        }
        -self.daily_realized_pnl / self.day_start_equity
    }
}

/// 한 시점의 평가 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub state: RiskState,
    pub breaches: Vec<RiskBreach>,
}

impl RiskAssessment {
    /// 신규 진입 차단 여부.
    pub fn is_halted(&self) -> bool {
        !self.breaches.is_empty()
    }
}

/// 리스크 서킷 브레이커.
#[derive(Debug, Clone, Default)]
pub struct RiskGovernor {
    limits: RiskLimits,
}

impl RiskGovernor {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn halt_policy(&self) -> HaltPolicy {
        self.limits.halt_policy
    }

    /// 리스크 상태 계산.
    ///
    /// `now`는 현재 시뮬레이션 시각입니다. 일일 손익은 `now`와 같은 UTC 날짜의
    /// 체결만 합산하며, 당일 시작 자산은 그 날짜 이전 마지막 스냅샷입니다.
    /// 두 슬라이스 모두 시각 오름차순이어야 합니다.
    pub fn state(&self, equity: &[EquityPoint], fills: &[Fill], now: DateTime<Utc>) -> RiskState {
        let peak_equity = equity
            .iter()
            .map(|p| p.equity)
            .max()
            .unwrap_or(Decimal::ZERO);
        self.state_with_peak(peak_equity, equity, fills, now)
    }

    /// 고점을 이미 알고 있을 때의 상태 계산. 자산 곡선 전체를 다시 훑지 않습니다.
    pub fn state_with_peak(
        &self,
        peak_equity: Decimal,
        equity: &[EquityPoint],
        fills: &[Fill],
        now: DateTime<Utc>,
    ) -> RiskState {
        let current_equity = equity.last().map_or(Decimal::ZERO, |p| p.equity);
        let peak_equity = peak_equity.max(current_equity);
        let current_drawdown = if peak_equity > Decimal::ZERO {
            ((peak_equity - current_equity) / peak_equity).max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };

        let today = now.date_naive();
        let day_open = today.and_time(NaiveTime::MIN).and_utc();
        let day_close = today
            .succ_opt()
            .map(|d| d.and_time(NaiveTime::MIN).and_utc());

        let first_today = fills.partition_point(|f| f.timestamp < day_open);
        let after_today = day_close.map_or(fills.len(), |close| {
            fills.partition_point(|f| f.timestamp < close)
        });
        let daily_realized_pnl = fills[first_today..after_today.max(first_today)]
            .iter()
            .map(Fill::net_pnl)
            .sum();

        let before_today = equity.partition_point(|p| p.timestamp < day_open);
        let day_start_equity = before_today
            .checked_sub(1)
            .and_then(|i| equity.get(i))
            .or_else(|| equity.first())
            .map_or(Decimal::ZERO, |p| p.equity);

        let consecutive_losses = fills
            .iter()
            .rev()
            .filter(|f| f.is_closing())
            .take_while(|f| f.is_loss())
            .count() as u32;

        // 윈도우가 표현 범위를 벗어나면 전체 이력을 윈도우로 봅니다
        let window_start = Duration::try_seconds(self.limits.trade_window_secs)
            .and_then(|window| now.checked_sub_signed(window));
        let window_lo =
            window_start.map_or(0, |start| fills.partition_point(|f| f.timestamp <= start));
        let window_hi = fills.partition_point(|f| f.timestamp <= now);
        let trades_in_window = window_hi.saturating_sub(window_lo) as u32;

        RiskState {
            peak_equity,
            current_equity,
            current_drawdown,
            daily_realized_pnl,
            day_start_equity,
            consecutive_losses,
            trades_in_window,
        }
    }

    /// 상태에 대해 위반된 한도 목록.
    pub fn breaches(&self, state: &RiskState) -> Vec<RiskBreach> {
        let mut breaches = Vec::new();

        if let Some(limit) = self.limits.max_drawdown_pct {
            if state.current_drawdown >= limit {
                breaches.push(RiskBreach::MaxDrawdown {
                    drawdown: state.current_drawdown,
                    limit,
                });
            }
        }

        if let Some(limit) = self.limits.max_daily_loss_pct {
            let loss_pct = state.daily_loss_pct();
            if loss_pct > Decimal::ZERO && loss_pct >= limit {
                breaches.push(RiskBreach::DailyLoss { loss_pct, limit });
            }
        }

        if let Some(limit) = self.limits.max_consecutive_losses {
            if state.consecutive_losses >= limit {
                breaches.push(RiskBreach::ConsecutiveLosses {
                    count: state.consecutive_losses,
                    limit,
                });
            }
        }

        if let Some(limit) = self.limits.max_trades_per_window {
            if state.trades_in_window >= limit {
                breaches.push(RiskBreach::TradeFrequency {
                    count: state.trades_in_window,
                    limit,
                });
            }
        }

        breaches
    }

    /// 상태 계산과 한도 판정을 한 번에.
    pub fn assess(&self, equity: &[EquityPoint], fills: &[Fill], now: DateTime<Utc>) -> RiskAssessment {
        let state = self.state(equity, fills, now);
        let breaches = self.breaches(&state);
        RiskAssessment { state, breaches }
    }

    /// `state_with_peak` 기반 평가.
    pub fn assess_with_peak(
        &self,
        peak_equity: Decimal,
        equity: &[EquityPoint],
        fills: &[Fill],
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        let state = self.state_with_peak(peak_equity, equity, fills, now);
        let breaches = self.breaches(&state);
        RiskAssessment { state, breaches }
    }

    /// 설정된 한도 중 하나라도 도달했으면 `true`.
    pub fn should_halt_new_positions(
        &self,
        equity: &[EquityPoint],
        fills: &[Fill],
        now: DateTime<Utc>,
    ) -> bool {
        self.limits.is_enabled() && self.assess(equity, fills, now).is_halted()
    }
}
