//! 내장 트레이딩 전략.
//!
//! - **MovingAverageCross**: 단기/장기 이동평균 골든/데드 크로스
//! - **Scripted**: 시각별 신호 재생
//!
//! `common` 서브모듈은 전략들이 공유하는 지표 계산을 제공합니다.

pub mod common;
pub mod moving_average;
pub mod scripted;
