//! 백테스팅 엔진
//!
//! 사전 로드된 시장 데이터 위에서 전략을 결정론적으로 시뮬레이션합니다.
//!
//! # 스텝 순서
//!
//! 병합된 타임라인의 각 시각 `t`마다:
//!
//! 1. `t` 기준 뷰 생성 (`timestamp ≤ t` 캔들만 포함)
//! 2. 뷰에 있는 심볼 현재가 반영
//! 3. 자산 스냅샷
//! 4. 손절/익절 보호 청산, `HaltPolicy::Flatten`이면 리스크 청산 신호 생성
//! 5. 전략 호출 (`calculate_indicators` → `generate_signals`)
//! 6. 신호를 생성 순서대로 체결 시뮬레이션 후 원장 반영
//!
//! 타임라인이 끝나면 마지막 가격으로 한 번 더 평가하고 스냅샷을 남긴 뒤
//! 성과 지표를 계산합니다.
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! use trader_analytics::backtest::{BacktestConfig, SimulationClock};
//!
//! let config = BacktestConfig::new(dec!(10000), vec!["BTC".to_string()])
//!     .with_fee_rate(dec!(0.001))
//!     .with_slippage_rate(dec!(0.0005));
//!
//! let mut clock = SimulationClock::new(config, strategy)?;
//! let report = clock.run(&data)?;
//! println!("{}", report.summary());
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use trader_core::{
    EquityPoint, Fill, FillOutcome, MarketDataSet, MarketView, Position, Signal, SignalDirection,
};
use trader_execution::{FillSimulator, LedgerError, PositionLedger};
use trader_risk::{
    flatten_signals, protective_exits, HaltPolicy, RiskAssessment, RiskGovernor,
    PROTECTIVE_STRATEGY_ID,
};
use trader_strategy::Strategy;

use super::config::{BacktestConfig, ConfigError};
use super::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticsSink, TracingSink};
use crate::equity::EquityTracker;
use crate::performance::{Metrics, PerformanceAnalyzer};

/// 종료 시 청산 사유.
const END_OF_RUN_REASON: &str = "end_of_run";

/// 시뮬레이션 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for ClockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClockState::Idle => "idle",
            ClockState::Running => "running",
            ClockState::Completed => "completed",
            ClockState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// 원장 불변식 위반 시점까지의 기록.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMortem {
    pub timestamp: DateTime<Utc>,
    /// 원장이 거부한 체결
    pub offending_fill: Fill,
    pub fills: Vec<Fill>,
    pub equity_curve: Vec<EquityPoint>,
    pub positions: Vec<Position>,
    pub cash: Decimal,
    pub diagnostics: Vec<Diagnostic>,
}

/// 시뮬레이션 오류.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// 설정 오류
    #[error("백테스트 설정 오류: {0}")]
    Config(#[from] ConfigError),

    /// 기간/심볼 필터 후 남은 데이터 없음
    #[error("시뮬레이션할 데이터가 없습니다")]
    NoData,

    /// Idle 상태가 아닌 엔진에서 run 호출
    #[error("실행할 수 없는 상태: {0}")]
    InvalidState(ClockState),

    /// 원장 불변식 위반 (상위 로직 버그)
    #[error("원장 불변식 위반: {source}")]
    LedgerInvariant {
        #[source]
        source: LedgerError,
        post_mortem: Box<PostMortem>,
    },
}

/// 백테스트 실행 리포트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// 설정 정보
    pub config: BacktestConfig,
    pub state: ClockState,

    /// 자산 곡선 (마지막 포인트는 종료 평가)
    pub equity_curve: Vec<EquityPoint>,

    /// 체결 로그 (체결 순서)
    pub fills: Vec<Fill>,

    /// 종료 시 보유 포지션
    pub final_positions: Vec<Position>,
    pub final_cash: Decimal,

    /// 성과 지표
    pub metrics: Metrics,

    /// 스텝 진단
    pub diagnostics: Vec<Diagnostic>,

    /// 처리한 타임라인 시각 수
    pub steps: usize,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl SimulationReport {
    /// 최종 자산.
    pub fn final_equity(&self) -> Decimal {
        self.metrics.final_equity
    }

    /// 특정 종류의 진단만.
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// 결과 요약 문자열 생성
    pub fn summary(&self) -> String {
        let duration_days = (self.end_time - self.start_time).num_days();
        let m = &self.metrics;
        let profit_factor = if m.has_infinite_profit_factor() {
            "∞".to_string()
        } else {
            format!("{:.2}", m.profit_factor)
        };

        format!(
            "백테스트 결과 요약\n\
             ═══════════════════════════════════════\n\
             기간: {} → {} ({} 일)\n\
             스텝: {}\n\
             ───────────────────────────────────────\n\
             초기 자본: {}\n\
             최종 자산: {:.2}\n\
             순수익: {:.2}\n\
             총 수익률: {:.2}%\n\
             연율화 수익률: {:.2}%\n\
             ───────────────────────────────────────\n\
             총 체결: {} (진입 {} / 청산 {})\n\
             승률: {:.1}%\n\
             프로핏 팩터: {}\n\
             ───────────────────────────────────────\n\
             샤프 비율: {:.2}\n\
             소르티노 비율: {:.2}\n\
             최대 낙폭: {:.2}%\n\
             칼마 비율: {:.2}\n\
             VaR(95%): {:.2}%\n\
             리스크 등급: {}\n\
             ───────────────────────────────────────\n\
             총 수수료: {:.2}\n\
             총 슬리피지: {:.2}\n\
             진단: {}\n\
             ═══════════════════════════════════════",
            self.start_time.format("%Y-%m-%d"),
            self.end_time.format("%Y-%m-%d"),
            duration_days,
            self.steps,
            self.config.initial_balance,
            m.final_equity,
            m.net_profit,
            m.total_return * 100.0,
            m.annualized_return * 100.0,
            m.total_fills,
            m.opening_fills,
            m.closing_fills,
            m.win_rate * 100.0,
            profit_factor,
            m.sharpe_ratio,
            m.sortino_ratio,
            m.max_drawdown * 100.0,
            m.calmar_ratio,
            m.var_95 * 100.0,
            m.risk_level,
            m.total_fees,
            m.total_slippage,
            self.diagnostics.len(),
        )
    }
}

/// 시뮬레이션 시계.
///
/// 엔진은 전략의 구체 타입을 모르고 [`Strategy`] trait에만 의존합니다.
/// 진단은 생성 시 주입한 싱크로 내보냅니다 (기본값 [`TracingSink`]).
pub struct SimulationClock<S: Strategy> {
    config: BacktestConfig,
    strategy: S,
    simulator: FillSimulator,
    ledger: PositionLedger,
    tracker: EquityTracker,
    governor: RiskGovernor,
    fills: Vec<Fill>,
    diagnostics: Vec<Diagnostic>,
    sink: Box<dyn DiagnosticsSink>,
    state: ClockState,
    halted: bool,
    steps: usize,
}

impl<S: Strategy> SimulationClock<S> {
    /// 설정을 검증하고 엔진을 생성합니다.
    pub fn new(config: BacktestConfig, strategy: S) -> Result<Self, ConfigError> {
        config.validate()?;

        let simulator =
            FillSimulator::new(config.fee_rate, config.slippage_rate).with_leverage(config.leverage);
        let ledger = PositionLedger::new(config.initial_balance).with_leverage(config.leverage);
        let governor = RiskGovernor::new(config.risk.clone());

        Ok(Self {
            config,
            strategy,
            simulator,
            ledger,
            tracker: EquityTracker::new(),
            governor,
            fills: Vec::new(),
            diagnostics: Vec::new(),
            sink: Box::new(TracingSink),
            state: ClockState::Idle,
            halted: false,
            steps: 0,
        })
    }

    /// 진단 싱크 교체.
    pub fn with_sink(mut self, sink: impl DiagnosticsSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn into_strategy(self) -> S {
        self.strategy
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        self.tracker.points()
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// 백테스트 실행.
    ///
    /// 엔진 하나당 한 번만 실행할 수 있습니다.
    pub fn run(&mut self, data: &MarketDataSet) -> Result<SimulationReport, SimulationError> {
        if self.state != ClockState::Idle {
            return Err(SimulationError::InvalidState(self.state));
        }
        self.state = ClockState::Running;

        let prepared = self.prepare(data);
        let timeline = prepared.timeline();
        let (Some(&start_time), Some(&end_time)) = (timeline.first(), timeline.last()) else {
            self.state = ClockState::Failed;
            return Err(SimulationError::NoData);
        };

        info!(
            strategy = %self.strategy.name(),
            symbols = ?self.config.symbols,
            steps = timeline.len(),
            initial_balance = %self.config.initial_balance,
            "백테스트 시작"
        );

        for &t in &timeline {
            let view = prepared.view_at(t);
            if let Err(e) = self.step(t, &view) {
                self.state = ClockState::Failed;
                return Err(e);
            }
            self.steps += 1;
        }

        if let Err(e) = self.finish(end_time, &prepared.view_at(end_time)) {
            self.state = ClockState::Failed;
            return Err(e);
        }
        self.state = ClockState::Completed;

        let analyzer = PerformanceAnalyzer::new(self.config.periods_per_year)
            .with_risk_free_rate(self.config.risk_free_rate);
        let metrics = analyzer.analyze(self.tracker.points(), &self.fills);

        info!(
            steps = self.steps,
            fills = self.fills.len(),
            final_equity = %metrics.final_equity,
            sharpe = metrics.sharpe_ratio,
            max_drawdown = metrics.max_drawdown,
            "백테스트 완료"
        );

        Ok(SimulationReport {
            config: self.config.clone(),
            state: self.state,
            equity_curve: self.tracker.points().to_vec(),
            fills: self.fills.clone(),
            final_positions: self.ledger.positions().cloned().collect(),
            final_cash: self.ledger.cash(),
            metrics,
            diagnostics: self.diagnostics.clone(),
            steps: self.steps,
            start_time,
            end_time,
        })
    }

    /// 설정 밖 심볼과 기간 밖 캔들을 제외하고 데이터를 정제합니다.
    fn prepare(&mut self, data: &MarketDataSet) -> MarketDataSet {
        let unknown: BTreeSet<String> = data
            .keys()
            .filter(|key| !self.config.is_tradable(&key.symbol))
            .map(|key| key.symbol.clone())
            .collect();
        for symbol in &unknown {
            self.emit(Diagnostic::new(
                None,
                DiagnosticKind::UnknownSymbol,
                Some(symbol.as_str()),
                "설정에 없는 심볼의 데이터를 무시합니다",
            ));
        }

        let config = &self.config;
        let mut prepared = data.filtered(
            |key| config.is_tradable(&key.symbol),
            |bar| config.contains(bar.timestamp),
        );

        for issue in prepared.sanitize() {
            self.emit(Diagnostic::new(
                issue.timestamp,
                DiagnosticKind::DataIssue,
                Some(issue.key.symbol.as_str()),
                format!("{} 데이터 정제: {:?}", issue.key, issue.kind),
            ));
        }
        prepared
    }

    fn step(&mut self, t: DateTime<Utc>, view: &MarketView<'_>) -> Result<(), SimulationError> {
        self.mark_to_market(view);
        self.tracker.snapshot(t, &self.ledger);

        let mut queue = Vec::new();
        if self.config.protective_exits {
            for signal in protective_exits(self.ledger.positions()) {
                self.emit(Diagnostic::new(
                    Some(t),
                    DiagnosticKind::ForcedExit,
                    Some(signal.symbol.as_str()),
                    format!("보호 청산: {}", signal.reason().unwrap_or_default()),
                ));
                queue.push(signal);
            }
        }

        if self.update_halt(t) && self.governor.halt_policy() == HaltPolicy::Flatten {
            let pending: BTreeSet<String> = queue.iter().map(|s| s.symbol.clone()).collect();
            let flatten = flatten_signals(
                self.ledger
                    .positions()
                    .filter(|p| !pending.contains(&p.symbol)),
            );
            for signal in flatten {
                self.emit(Diagnostic::new(
                    Some(t),
                    DiagnosticKind::ForcedExit,
                    Some(signal.symbol.as_str()),
                    "리스크 한도 도달로 전량 청산",
                ));
                queue.push(signal);
            }
        }

        let generated = self
            .strategy
            .calculate_indicators(view)
            .and_then(|()| self.strategy.generate_signals(view));
        match generated {
            Ok(signals) => {
                for signal in signals {
                    if signal.confidence < self.config.min_confidence {
                        self.emit(Diagnostic::new(
                            Some(t),
                            DiagnosticKind::LowConfidence,
                            Some(signal.symbol.as_str()),
                            format!(
                                "신뢰도 미달: {:.2} < {:.2}",
                                signal.confidence, self.config.min_confidence
                            ),
                        ));
                        continue;
                    }
                    queue.push(signal);
                }
            }
            Err(e) => {
                self.emit(Diagnostic::new(
                    Some(t),
                    DiagnosticKind::StrategyError,
                    None,
                    format!("{} 전략 오류: {e}", self.strategy.name()),
                ));
            }
        }

        for signal in &queue {
            self.process_signal(t, signal, view)?;
        }
        Ok(())
    }

    /// 종료 평가: 마지막 가격 반영, 선택적 전량 청산, 최종 스냅샷.
    fn finish(&mut self, t: DateTime<Utc>, view: &MarketView<'_>) -> Result<(), SimulationError> {
        self.mark_to_market(view);

        if self.config.close_positions_at_end {
            let closes: Vec<Signal> = self
                .ledger
                .positions()
                .map(|p| {
                    Signal::new(
                        PROTECTIVE_STRATEGY_ID,
                        p.symbol.clone(),
                        SignalDirection::close_of(p.side),
                        p.size,
                    )
                    .with_metadata("reason", serde_json::json!(END_OF_RUN_REASON))
                })
                .collect();
            for signal in &closes {
                self.emit(Diagnostic::new(
                    Some(t),
                    DiagnosticKind::ForcedExit,
                    Some(signal.symbol.as_str()),
                    "종료 시 보유 포지션 청산",
                ));
                self.process_signal(t, signal, view)?;
            }
        }

        self.tracker.snapshot(t, &self.ledger);
        Ok(())
    }

    fn mark_to_market(&mut self, view: &MarketView<'_>) {
        for symbol in view.symbols() {
            if let Some(price) = view.price(symbol) {
                self.ledger.mark_to_market(symbol, price);
            }
        }
    }

    fn is_halted(&self, t: DateTime<Utc>) -> bool {
        self.governor.limits().is_enabled() && self.assess(t).is_halted()
    }

    fn assess(&self, t: DateTime<Utc>) -> RiskAssessment {
        self.governor
            .assess_with_peak(self.tracker.peak(), self.tracker.points(), &self.fills, t)
    }

    /// 스텝 시작 시 서킷 브레이커 상태 갱신. 전환 시점에만 진단을 남깁니다.
    fn update_halt(&mut self, t: DateTime<Utc>) -> bool {
        if !self.governor.limits().is_enabled() {
            return false;
        }
        let assessment = self.assess(t);
        let halted = assessment.is_halted();

        if halted && !self.halted {
            let reasons: Vec<String> = assessment.breaches.iter().map(ToString::to_string).collect();
            self.emit(Diagnostic::new(
                Some(t),
                DiagnosticKind::RiskHalt,
                None,
                format!("신규 진입 차단: {}", reasons.join(", ")),
            ));
        } else if !halted && self.halted {
            info!(timestamp = %t, "리스크 한도 해제, 신규 진입 재개");
        }
        self.halted = halted;
        halted
    }

    fn process_signal(
        &mut self,
        t: DateTime<Utc>,
        signal: &Signal,
        view: &MarketView<'_>,
    ) -> Result<(), SimulationError> {
        let symbol = signal.symbol.as_str();

        if !self.config.is_tradable(symbol) {
            self.emit(Diagnostic::new(
                Some(t),
                DiagnosticKind::UnknownSymbol,
                Some(symbol),
                "설정에 없는 심볼의 신호를 무시합니다",
            ));
            return Ok(());
        }

        // 같은 스텝의 앞선 체결이 한도를 넘길 수 있으므로 진입마다 다시 확인
        if signal.direction.is_opening() && self.is_halted(t) {
            self.emit(Diagnostic::new(
                Some(t),
                DiagnosticKind::RiskHalt,
                Some(symbol),
                format!("리스크 한도로 진입 신호 제외: {}", signal.direction),
            ));
            return Ok(());
        }

        let Some(price) = view.price(symbol) else {
            self.emit(Diagnostic::new(
                Some(t),
                DiagnosticKind::NoPrice,
                Some(symbol),
                "아직 가격 데이터가 없습니다",
            ));
            return Ok(());
        };

        let fill = match self.simulator.execute(signal, price, &self.ledger, t) {
            FillOutcome::Rejected(reason) => {
                self.emit(Diagnostic::new(
                    Some(t),
                    DiagnosticKind::SignalRejected,
                    Some(symbol),
                    format!("{} 거부: {reason}", signal.direction),
                ));
                return Ok(());
            }
            FillOutcome::Clamped(fill, requested) => {
                self.emit(Diagnostic::new(
                    Some(t),
                    DiagnosticKind::SignalClamped,
                    Some(symbol),
                    format!("청산 수량 축소: 요청 {requested}, 체결 {}", fill.executed_qty),
                ));
                fill
            }
            FillOutcome::Filled(fill) => fill,
        };

        if let Err(source) = self.apply(signal, &fill) {
            return Err(self.abort(t, fill, source));
        }

        debug!(
            symbol = %fill.symbol,
            direction = %fill.direction,
            qty = %fill.executed_qty,
            price = %fill.executed_price,
            fee = %fill.fee,
            pnl = %fill.realized_pnl_component,
            "체결"
        );
        self.strategy.on_fill(&fill);
        self.fills.push(fill);
        Ok(())
    }

    fn apply(&mut self, signal: &Signal, fill: &Fill) -> Result<(), LedgerError> {
        self.ledger.apply_fill(fill)?;
        if signal.direction.is_open() && (signal.stop_loss.is_some() || signal.take_profit.is_some())
        {
            self.ledger
                .set_protection(&signal.symbol, signal.stop_loss, signal.take_profit)?;
        }
        Ok(())
    }

    fn abort(&self, t: DateTime<Utc>, fill: Fill, source: LedgerError) -> SimulationError {
        error!(timestamp = %t, symbol = %fill.symbol, error = %source, "원장 불변식 위반, 실행 중단");
        let post_mortem = PostMortem {
            timestamp: t,
            offending_fill: fill,
            fills: self.fills.clone(),
            equity_curve: self.tracker.points().to_vec(),
            positions: self.ledger.positions().cloned().collect(),
            cash: self.ledger.cash(),
            diagnostics: self.diagnostics.clone(),
        };
        SimulationError::LedgerInvariant {
            source,
            post_mortem: Box::new(post_mortem),
        }
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        self.sink.record(&diagnostic);
        self.diagnostics.push(diagnostic);
    }
}
