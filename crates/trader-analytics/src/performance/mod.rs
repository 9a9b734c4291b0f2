//! 성과 분석 모듈.

pub mod analyzer;
pub mod metrics;
pub mod stats;

pub use analyzer::{analyze, PerformanceAnalyzer, DEFAULT_PERIODS_PER_YEAR};
pub use metrics::{Metrics, SymbolStats};
