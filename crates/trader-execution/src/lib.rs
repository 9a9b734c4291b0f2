//! 체결 시뮬레이션 및 포지션 원장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 현금과 심볼별 포지션을 관리하는 포지션 원장
//! - 슬리피지/수수료/자금 부족 거부를 모델링하는 체결 시뮬레이터
//! - 실시간 구동 시 원장 변경을 직렬화하는 공유 원장
//!
//! # 예제
//!
//! ```rust,ignore
//! use trader_execution::{FillSimulator, PositionLedger};
//!
//! let mut ledger = PositionLedger::new(dec!(10000));
//! let simulator = FillSimulator::new(dec!(0.001), dec!(0.0005));
//!
//! let outcome = simulator.execute(&signal, dec!(100), &ledger, now);
//! if let Some(fill) = outcome.fill() {
//!     ledger.apply_fill(fill)?;
//! }
//! ```

pub mod fill_simulator;
pub mod position_ledger;
pub mod shared_ledger;

// 주요 타입 재내보내기
pub use fill_simulator::{apply_slippage, validate_funds, FillSimulator};
pub use position_ledger::{LedgerError, LedgerView, PositionLedger};
pub use shared_ledger::SharedLedger;
