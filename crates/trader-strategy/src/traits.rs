//! Strategy trait 정의.

use serde_json::Value;
use trader_core::{Fill, MarketView, Signal};

/// 전략 오류 타입.
pub type StrategyError = Box<dyn std::error::Error + Send + Sync>;

/// 전략 결과 타입.
pub type StrategyResult<T> = Result<T, StrategyError>;

/// 트레이딩 전략 구현을 위한 Strategy trait.
///
/// 엔진은 매 시뮬레이션 시각마다 `calculate_indicators` → `generate_signals` 순으로 호출합니다.
/// 전달되는 뷰에는 `timestamp ≤ t` 인 캔들만 있으므로 미래 데이터를 볼 수 없습니다.
///
/// 오류를 반환해도 해당 스텝만 건너뛰고 시뮬레이션은 계속됩니다.
pub trait Strategy {
    /// 전략 이름 반환.
    fn name(&self) -> &str;

    /// 전략 버전 반환.
    fn version(&self) -> &str {
        "1.0.0"
    }

    /// 지표 갱신.
    fn calculate_indicators(&mut self, _view: &MarketView<'_>) -> StrategyResult<()> {
        Ok(())
    }

    /// 현재 뷰에 대한 신호 생성.
    ///
    /// 반환 순서가 같은 시각 신호들의 처리 순서입니다.
    fn generate_signals(&mut self, view: &MarketView<'_>) -> StrategyResult<Vec<Signal>>;

    /// 체결 통지.
    ///
    /// 전략이 생성한 신호뿐 아니라 보호 청산/리스크 청산 체결도 전달됩니다.
    fn on_fill(&mut self, _fill: &Fill) {}

    /// 현재 전략 상태를 JSON으로 반환 (디버깅/모니터링용).
    fn get_state(&self) -> Value {
        Value::Null
    }
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn version(&self) -> &str {
        (**self).version()
    }

    fn calculate_indicators(&mut self, view: &MarketView<'_>) -> StrategyResult<()> {
        (**self).calculate_indicators(view)
    }

    fn generate_signals(&mut self, view: &MarketView<'_>) -> StrategyResult<Vec<Signal>> {
        (**self).generate_signals(view)
    }

    fn on_fill(&mut self, fill: &Fill) {
        (**self).on_fill(fill)
    }

    fn get_state(&self) -> Value {
        (**self).get_state()
    }
}
