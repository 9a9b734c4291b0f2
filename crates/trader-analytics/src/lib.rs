//! 백테스트 및 성과 분석.
//!
//! 이 crate는 다음을 제공합니다:
//! - `EquityTracker` - 자산 곡선 기록, 최고점/낙폭 추적
//! - `PerformanceAnalyzer` - 자산 곡선과 체결 로그에서 성과 지표 계산
//! - `SimulationClock` - 결정론적 단일 스레드 백테스트 루프
//!
//! # 예제
//!
//! ```rust,ignore
//! use trader_analytics::{BacktestConfig, SimulationClock};
//! use trader_strategy::{MaCrossConfig, MovingAverageCrossStrategy};
//!
//! let config = BacktestConfig::new(dec!(10000), vec!["BTC".to_string()]);
//! let strategy = MovingAverageCrossStrategy::new(MaCrossConfig::default())?;
//!
//! let mut clock = SimulationClock::new(config, strategy)?;
//! let report = clock.run(&data)?;
//! println!("{}", report.summary());
//! ```

pub mod backtest;
pub mod equity;
pub mod performance;

pub use backtest::{
    BacktestConfig, ClockState, CollectingSink, ConfigError, Diagnostic, DiagnosticKind,
    DiagnosticsSink, PostMortem, SimulationClock, SimulationError, SimulationReport, TracingSink,
};
pub use equity::EquityTracker;
pub use performance::{analyze, Metrics, PerformanceAnalyzer, SymbolStats};
