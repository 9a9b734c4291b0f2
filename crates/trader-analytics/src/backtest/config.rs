//! 백테스트 설정.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trader_risk::{RiskConfigError, RiskLimits};

/// 설정 검증 오류.
///
/// 루프 시작 전에만 발생하며 복구할 대상이 없습니다.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("시작 시각은 종료 시각보다 앞서야 합니다: {start} ≥ {end}")]
    InvalidDateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("초기 자본은 0보다 커야 합니다: {0}")]
    NonPositiveBalance(Decimal),
    #[error("수수료율은 0 이상이어야 합니다: {0}")]
    NegativeFee(Decimal),
    #[error("슬리피지율은 0 이상 1 미만이어야 합니다: {0}")]
    InvalidSlippage(Decimal),
    #[error("레버리지는 0보다 커야 합니다: {0}")]
    NonPositiveLeverage(Decimal),
    #[error("심볼이 하나 이상 필요합니다")]
    NoSymbols,
    #[error("연간 주기 수는 0보다 커야 합니다: {0}")]
    InvalidPeriodsPerYear(f64),
    #[error("최소 신뢰도는 0 ~ 1 범위여야 합니다: {0}")]
    InvalidConfidence(f64),
    #[error("무위험 이자율이 유효하지 않습니다: {0}")]
    InvalidRiskFreeRate(f64),
    #[error("리스크 한도 오류: {0}")]
    Risk(#[from] RiskConfigError),
}

/// 백테스트 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// 시작 시각 (포함, 없으면 데이터 처음부터)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,

    /// 종료 시각 (포함, 없으면 데이터 끝까지)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,

    /// 초기 자본금
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,

    /// 거래 수수료율 (예: 0.001 = 0.1%)
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,

    /// 슬리피지율 (예: 0.0005 = 0.05%)
    #[serde(default = "default_slippage_rate")]
    pub slippage_rate: Decimal,

    /// 레버리지 (1 = 현물)
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,

    /// 거래 대상 심볼
    #[serde(default)]
    pub symbols: Vec<String>,

    /// 연간 주기 수 (연율화용)
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: f64,

    /// 연 무위험 이자율
    #[serde(default)]
    pub risk_free_rate: f64,

    /// 최소 신호 신뢰도 (기본값: 0.0 = 모든 신호 허용)
    #[serde(default)]
    pub min_confidence: f64,

    /// 손절/익절 자동 청산
    #[serde(default = "default_protective_exits")]
    pub protective_exits: bool,

    /// 종료 시 보유 포지션 청산
    #[serde(default)]
    pub close_positions_at_end: bool,

    /// 서킷 브레이커 한도
    #[serde(default)]
    pub risk: RiskLimits,
}

// 설정 기본값 함수들 (serde default용)
fn default_initial_balance() -> Decimal {
    Decimal::new(10_000, 0)
}
fn default_fee_rate() -> Decimal {
    Decimal::new(1, 3)
} // 0.1%
fn default_slippage_rate() -> Decimal {
    Decimal::new(5, 4)
} // 0.05%
fn default_leverage() -> Decimal {
    Decimal::ONE
}
fn default_periods_per_year() -> f64 {
    365.0
}
fn default_protective_exits() -> bool {
    true
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            initial_balance: default_initial_balance(),
            fee_rate: default_fee_rate(),
            slippage_rate: default_slippage_rate(),
            leverage: default_leverage(),
            symbols: Vec::new(),
            periods_per_year: default_periods_per_year(),
            risk_free_rate: 0.0,
            min_confidence: 0.0,
            protective_exits: default_protective_exits(),
            close_positions_at_end: false,
            risk: RiskLimits::default(),
        }
    }
}

impl BacktestConfig {
    /// 새로운 백테스트 설정을 생성합니다.
    pub fn new(initial_balance: Decimal, symbols: Vec<String>) -> Self {
        Self {
            initial_balance,
            symbols,
            ..Default::default()
        }
    }

    /// 기간 설정 (양 끝 포함)
    pub fn with_period(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// 수수료율 설정
    pub fn with_fee_rate(mut self, rate: Decimal) -> Self {
        self.fee_rate = rate;
        self
    }

    /// 슬리피지율 설정
    pub fn with_slippage_rate(mut self, rate: Decimal) -> Self {
        self.slippage_rate = rate;
        self
    }

    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = leverage;
        self
    }

    /// 연율화 주기 설정
    pub fn with_periods_per_year(mut self, periods: f64) -> Self {
        self.periods_per_year = periods;
        self
    }

    /// 무위험 이자율 설정
    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    /// 최소 신뢰도 설정
    pub fn with_min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = confidence;
        self
    }

    pub fn with_protective_exits(mut self, enabled: bool) -> Self {
        self.protective_exits = enabled;
        self
    }

    pub fn with_close_positions_at_end(mut self, enabled: bool) -> Self {
        self.close_positions_at_end = enabled;
        self
    }

    /// 리스크 한도 설정
    pub fn with_risk_limits(mut self, limits: RiskLimits) -> Self {
        self.risk = limits;
        self
    }

    /// 심볼이 거래 대상인지.
    pub fn is_tradable(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    /// 시각이 설정 기간 안인지.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| t >= start) && self.end.map_or(true, |end| t <= end)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(ConfigError::InvalidDateRange { start, end });
            }
        }
        if self.initial_balance <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveBalance(self.initial_balance));
        }
        if self.fee_rate < Decimal::ZERO {
            return Err(ConfigError::NegativeFee(self.fee_rate));
        }
        if self.slippage_rate < Decimal::ZERO || self.slippage_rate >= Decimal::ONE {
            return Err(ConfigError::InvalidSlippage(self.slippage_rate));
        }
        if self.leverage <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveLeverage(self.leverage));
        }
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if !self.periods_per_year.is_finite() || self.periods_per_year <= 0.0 {
            return Err(ConfigError::InvalidPeriodsPerYear(self.periods_per_year));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::InvalidConfidence(self.min_confidence));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(ConfigError::InvalidRiskFreeRate(self.risk_free_rate));
        }
        self.risk.validate()?;
        Ok(())
    }
}
