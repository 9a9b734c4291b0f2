//! 백테스트 엔진 공통 도메인 모델.
//!
//! 이 crate는 시뮬레이션 루프, 체결 시뮬레이터, 포지션 원장, 리스크 관리,
//! 성과 분석이 모두 공유하는 단일 데이터 모델을 제공합니다:
//! - 시그널 (`Signal`, `SignalDirection`)
//! - 시장 데이터 (`Bar`, `MarketDataSet`, `MarketView`)
//! - 체결 (`Fill`, `FillOutcome`)
//! - 포지션 (`Position`)
//! - 자산 곡선 (`EquityPoint`)

pub mod domain;

pub use domain::*;
