//! 리스크 관리.
//!
//! 이 crate는 다음을 제공합니다:
//! - `RiskLimits` / `HaltPolicy` - 서킷 브레이커 한도 설정
//! - `RiskGovernor` - 자산 곡선과 체결 로그만으로 계산하는 순수 평가기
//! - 손절/익절 보호 청산 스캔
//! - 포지션 크기 계산 (고정 리스크, Kelly)
//! - `RiskLevel` - 성과 지표 기반 리스크 등급
//!
//! RiskGovernor는 상태를 갖지 않습니다. 매 스텝 `&[EquityPoint]`와 `&[Fill]`로부터
//! `RiskState`를 다시 계산하므로 원장과 어긋나는 숨은 카운터가 없습니다.

pub mod config;
pub mod governor;
pub mod level;
pub mod protection;
pub mod sizing;

pub use config::{HaltPolicy, RiskConfigError, RiskLimits};
pub use governor::{RiskAssessment, RiskBreach, RiskGovernor, RiskState};
pub use level::{RiskLevel, RiskLevelInputs};
pub use protection::{flatten_signals, protective_exits, ExitTrigger, PROTECTIVE_STRATEGY_ID};
pub use sizing::{fixed_risk_quantity, kelly_fraction, kelly_quantity, MAX_KELLY_FRACTION};
