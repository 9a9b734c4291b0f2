//! 리스크 한도 설정.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 리스크 한도 검증 오류.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskConfigError {
    #[error("비율 한도 {name}은(는) 0 초과 1 이하여야 합니다: {value}")]
    InvalidPercent { name: &'static str, value: Decimal },
    #[error("횟수 한도 {name}은(는) 0보다 커야 합니다")]
    ZeroCount { name: &'static str },
    #[error("거래 빈도 윈도우는 0보다 커야 합니다")]
    ZeroWindow,
    #[error("거래 빈도 윈도우가 표현 가능한 범위를 벗어났습니다: {0}초")]
    InvalidWindow(i64),
}

/// 한도 도달 시 대응 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltPolicy {
    /// 신규 진입만 차단 (기존 포지션 유지)
    #[default]
    StopOpening,
    /// 신규 진입 차단 + 보유 포지션 전량 청산
    Flatten,
}

/// 서킷 브레이커 한도.
///
/// 모든 한도는 `None`이면 비활성화됩니다. 비율은 소수입니다 (0.1 = 10%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// 최대 낙폭 (고점 대비)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_drawdown_pct: Option<Decimal>,

    /// 일일 최대 손실 (당일 시작 자산 대비)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_daily_loss_pct: Option<Decimal>,

    /// 최대 연속 손실 청산 횟수
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_losses: Option<u32>,

    /// 윈도우 내 최대 체결 수
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_trades_per_window: Option<u32>,

    /// 거래 빈도 윈도우 (초)
    #[serde(default = "default_trade_window_secs")]
    pub trade_window_secs: i64,

    /// 한도 도달 시 정책
    #[serde(default)]
    pub halt_policy: HaltPolicy,
}

fn default_trade_window_secs() -> i64 {
    3600
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_drawdown_pct: None,
            max_daily_loss_pct: None,
            max_consecutive_losses: None,
            max_trades_per_window: None,
            trade_window_secs: default_trade_window_secs(),
            halt_policy: HaltPolicy::default(),
        }
    }
}

impl RiskLimits {
    /// 한도가 하나도 없는 설정.
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_drawdown(mut self, pct: Decimal) -> Self {
        self.max_drawdown_pct = Some(pct);
        self
    }

    pub fn with_max_daily_loss(mut self, pct: Decimal) -> Self {
        self.max_daily_loss_pct = Some(pct);
        self
    }

    pub fn with_max_consecutive_losses(mut self, count: u32) -> Self {
        self.max_consecutive_losses = Some(count);
        self
    }

    pub fn with_max_trades_per_window(mut self, count: u32, window_secs: i64) -> Self {
        self.max_trades_per_window = Some(count);
        self.trade_window_secs = window_secs;
        self
    }

    pub fn with_halt_policy(mut self, policy: HaltPolicy) -> Self {
        self.halt_policy = policy;
        self
    }

    /// 활성화된 한도가 있는지.
    pub fn is_enabled(&self) -> bool {
        self.max_drawdown_pct.is_some()
            || self.max_daily_loss_pct.is_some()
            || self.max_consecutive_losses.is_some()
            || self.max_trades_per_window.is_some()
    }

    /// 설정 검증.
    pub fn validate(&self) -> Result<(), RiskConfigError> {
        for (name, value) in [
            ("max_drawdown_pct", self.max_drawdown_pct),
            ("max_daily_loss_pct", self.max_daily_loss_pct),
        ] {
            if let Some(value) = value {
                if value <= Decimal::ZERO || value > Decimal::ONE {
                    return Err(RiskConfigError::InvalidPercent { name, value });
                }
            }
        }

        if self.max_consecutive_losses == Some(0) {
            return Err(RiskConfigError::ZeroCount {
                name: "max_consecutive_losses",
            });
        }
        if self.max_trades_per_window == Some(0) {
            return Err(RiskConfigError::ZeroCount {
                name: "max_trades_per_window",
            });
        }
        if self.trade_window_secs <= 0 {
            return Err(RiskConfigError::ZeroWindow);
        }
        if Duration::try_seconds(self.trade_window_secs).is_none() {
            return Err(RiskConfigError::InvalidWindow(self.trade_window_secs));
        }

        Ok(())
    }
}
