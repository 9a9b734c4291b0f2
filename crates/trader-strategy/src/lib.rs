//! 트레이딩 전략 인터페이스.
//!
//! 시뮬레이션 엔진은 [`Strategy`] trait에만 의존하며 구체 전략 타입을 알지 못합니다.
//!
//! 제공 전략:
//! - [`MovingAverageCrossStrategy`] - 단기/장기 이동평균 교차
//! - [`ScriptedStrategy`] - 시각별로 미리 정해둔 신호 재생 (검증/리플레이용)

pub mod strategies;
pub mod traits;

pub use strategies::common::simple_moving_average;
pub use strategies::moving_average::{MaCrossConfig, MaCrossConfigError, MovingAverageCrossStrategy};
pub use strategies::scripted::{Observation, ScriptedStrategy};
pub use traits::{Strategy, StrategyError, StrategyResult};
