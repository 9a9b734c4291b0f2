//! 시각별 신호 재생 전략.
//!
//! 미리 정해둔 신호를 지정한 시뮬레이션 시각에 그대로 반환합니다.
//! 회귀 테스트, 외부에서 기록한 신호의 재현, 엔진 검증에 사용합니다.
//!
//! 매 호출마다 뷰에 포함된 가장 늦은 캔들 시각을 기록하므로
//! 미래 데이터 노출 여부를 검사할 수 있습니다.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use trader_core::{Fill, MarketView, Signal};

use crate::traits::{Strategy, StrategyResult};

/// 한 번의 호출에서 관찰한 뷰 정보.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// 뷰 기준 시각
    pub view_timestamp: DateTime<Utc>,
    /// 뷰에 포함된 가장 늦은 캔들 시각
    pub latest_bar: Option<DateTime<Utc>>,
}

/// 시각별 신호 재생 전략.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStrategy {
    name: String,
    script: BTreeMap<DateTime<Utc>, Vec<Signal>>,
    failures: BTreeSet<DateTime<Utc>>,
    observations: Vec<Observation>,
    fills: Vec<Fill>,
}

impl ScriptedStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// 시각 `at`에 신호 추가.
    pub fn at(mut self, at: DateTime<Utc>, signal: Signal) -> Self {
        self.script.entry(at).or_default().push(signal);
        self
    }

    /// 시각 `at`에서 오류를 반환하도록 설정.
    pub fn fail_at(mut self, at: DateTime<Utc>) -> Self {
        self.failures.insert(at);
        self
    }

    /// 호출 기록.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// 통지받은 체결.
    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn calculate_indicators(&mut self, view: &MarketView<'_>) -> StrategyResult<()> {
        let latest_bar = view
            .iter()
            .filter_map(|(_, bars)| bars.last().map(|b| b.timestamp))
            .max();
        self.observations.push(Observation {
            view_timestamp: view.timestamp(),
            latest_bar,
        });
        Ok(())
    }

    fn generate_signals(&mut self, view: &MarketView<'_>) -> StrategyResult<Vec<Signal>> {
        let t = view.timestamp();
        if self.failures.contains(&t) {
            return Err(format!("스크립트 오류 주입: {t}").into());
        }
        Ok(self.script.get(&t).cloned().unwrap_or_default())
    }

    fn on_fill(&mut self, fill: &Fill) {
        self.fills.push(fill.clone());
    }

    fn get_state(&self) -> Value {
        json!({
            "scripted_steps": self.script.len(),
            "observations": self.observations.len(),
            "fills": self.fills.len(),
        })
    }
}
