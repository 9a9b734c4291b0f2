//! 스텝 단위 진단 기록.
//!
//! 복구 가능한 상황(데이터 문제, 거부된 신호, 전략 오류 등)은 루프를 멈추지 않고
//! 진단으로 남깁니다. 엔진은 생성 시 주입받은 [`DiagnosticsSink`]로 진단을 내보내며,
//! 모든 진단은 싱크와 무관하게 리포트에도 첨부됩니다.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 진단 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// 정렬/중복/불량 캔들 정제
    DataIssue,
    /// 설정에 없는 심볼 (데이터 또는 신호)
    UnknownSymbol,
    /// 뷰에 가격이 없는 심볼의 신호
    NoPrice,
    /// 체결 거부
    SignalRejected,
    /// 보유 수량으로 축소 체결
    SignalClamped,
    /// 최소 신뢰도 미달
    LowConfidence,
    /// 서킷 브레이커로 진입 차단
    RiskHalt,
    /// 전략 호출 실패
    StrategyError,
    /// 보호 청산 또는 강제 청산
    ForcedExit,
}

/// 진단 한 건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 발생 시각 (루프 시작 전 진단은 `None`)
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: DiagnosticKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        timestamp: Option<DateTime<Utc>>,
        kind: DiagnosticKind,
        symbol: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind,
            symbol: symbol.map(str::to_string),
            message: message.into(),
        }
    }
}

/// 진단 출력 대상.
pub trait DiagnosticsSink: Send {
    fn record(&mut self, diagnostic: &Diagnostic);
}

/// `tracing`으로 진단을 내보내는 기본 싱크.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&mut self, d: &Diagnostic) {
        let symbol = d.symbol.as_deref().unwrap_or("-");
        match d.kind {
            DiagnosticKind::SignalClamped | DiagnosticKind::LowConfidence => {
                debug!(kind = ?d.kind, symbol = %symbol, timestamp = ?d.timestamp, "{}", d.message)
            }
            DiagnosticKind::ForcedExit | DiagnosticKind::RiskHalt => {
                info!(kind = ?d.kind, symbol = %symbol, timestamp = ?d.timestamp, "{}", d.message)
            }
            _ => warn!(kind = ?d.kind, symbol = %symbol, timestamp = ?d.timestamp, "{}", d.message),
        }
    }
}

/// 진단을 메모리에 모으는 싱크.
///
/// 복제본끼리 같은 버퍼를 공유하므로 엔진에 넘긴 뒤에도 읽을 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    entries: Arc<Mutex<Vec<Diagnostic>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 모은 진단의 사본.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // 다른 스레드가 패닉해도 버퍼 내용은 유효하므로 그대로 사용
    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DiagnosticsSink for CollectingSink {
    fn record(&mut self, diagnostic: &Diagnostic) {
        self.lock().push(diagnostic.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_shares_buffer() {
        let sink = CollectingSink::new();
        let mut writer = sink.clone();
        writer.record(&Diagnostic::new(
            None,
            DiagnosticKind::UnknownSymbol,
            Some("DOGE"),
            "설정에 없는 심볼",
        ));

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.entries()[0].symbol.as_deref(), Some("DOGE"));
    }

    #[test]
    fn test_poisoned_sink_keeps_recording() {
        let mut sink = CollectingSink::new();
        sink.record(&Diagnostic::new(None, DiagnosticKind::NoPrice, Some("BTC"), "첫 진단"));

        let holder = sink.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.entries.lock().unwrap();
            panic!("잠금을 쥔 채 패닉");
        })
        .join();
        assert!(sink.entries.is_poisoned());

        sink.record(&Diagnostic::new(None, DiagnosticKind::NoPrice, Some("ETH"), "둘째 진단"));
        assert_eq!(sink.len(), 2);
        let symbols: Vec<_> = sink.entries().into_iter().filter_map(|d| d.symbol).collect();
        assert_eq!(symbols, vec!["BTC".to_string(), "ETH".to_string()]);
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        let mut sink = TracingSink;
        for kind in [
            DiagnosticKind::DataIssue,
            DiagnosticKind::SignalClamped,
            DiagnosticKind::ForcedExit,
        ] {
            sink.record(&Diagnostic::new(None, kind, None, "test"));
        }
    }
}
