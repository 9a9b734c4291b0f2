//! 시뮬레이션 엔진이 공유하는 도메인 모델.

pub mod equity;
pub mod fill;
pub mod market_data;
pub mod order;
pub mod position;
pub mod signal;

pub use equity::EquityPoint;
pub use fill::{Fill, FillOutcome, RejectReason};
pub use market_data::{
    Bar, DataIssue, DataIssueKind, MarketDataSet, MarketView, ParseTimeframeError, SeriesKey,
    Timeframe,
};
pub use order::{PositionSide, Side};
pub use position::{realized_pnl, unrealized_pnl, Position};
pub use signal::{Signal, SignalDirection};
