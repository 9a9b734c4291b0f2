//! 백테스팅 모듈
//!
//! 과거 데이터로 트레이딩 전략을 시뮬레이션하고 성과를 분석합니다.
//!
//! # 주요 구성요소
//!
//! - [`BacktestConfig`]: 백테스트 설정 (초기 자본, 수수료, 슬리피지, 리스크 한도 등)
//! - [`SimulationClock`]: 결정론적 백테스트 실행 엔진
//! - [`SimulationReport`]: 백테스트 결과 리포트
//! - [`DiagnosticsSink`]: 스텝 진단 출력 대상 ([`TracingSink`], [`CollectingSink`])

pub mod config;
pub mod diagnostics;
pub mod engine;

pub use config::{BacktestConfig, ConfigError};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticKind, DiagnosticsSink, TracingSink};
pub use engine::{ClockState, PostMortem, SimulationClock, SimulationError, SimulationReport};
