//! 시장 데이터 타입.
//!
//! - `Bar` - OHLCV 캔들
//! - `Timeframe` - 캔들 주기
//! - `SeriesKey` - (심볼, 주기) 시계열 식별자
//! - `MarketDataSet` - 사전 로드된 전체 시계열
//! - `MarketView` - 특정 시각 기준 "지금까지" 데이터 (look-ahead 없음)

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV 캔들.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// 캔들 시각
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

impl Bar {
    /// 새 캔들 생성.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 시가=고가=저가=종가인 캔들 (테스트/합성 데이터용).
    pub fn flat(timestamp: DateTime<Utc>, price: Decimal, volume: Decimal) -> Self {
        Self::new(timestamp, price, price, price, price, volume)
    }

    /// `low ≤ {open, close} ≤ high` 이고 종가가 양수인지 확인합니다.
    pub fn is_consistent(&self) -> bool {
        self.close > Decimal::ZERO
            && self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
    }
}

/// 캔들 주기.
///
/// 선언 순서가 곧 정렬 순서이며, 더 짧은 주기가 먼저 옵니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    /// 주기 길이 (초).
    pub fn as_secs(self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1_800,
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 14_400,
            Timeframe::D1 => 86_400,
            Timeframe::W1 => 604_800,
        }
    }

    /// 연간 주기 수 (연율화용, 24/7 시장 기준).
    pub fn periods_per_year(self) -> f64 {
        365.0 * 86_400.0 / self.as_secs() as f64
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        };
        write!(f, "{s}")
    }
}

/// 알 수 없는 주기 문자열.
#[derive(Debug, Clone, Error)]
#[error("알 수 없는 타임프레임: {0}")]
pub struct ParseTimeframeError(pub String);

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            "1w" => Ok(Timeframe::W1),
            other => Err(ParseTimeframeError(other.to_string())),
        }
    }
}

/// (심볼, 주기) 시계열 키.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.symbol, self.timeframe)
    }
}

/// 데이터 정제 중 발견된 문제 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataIssueKind {
    /// 시간순 정렬되지 않은 시계열 (정렬함)
    Unsorted,
    /// 같은 시각의 중복 캔들 (마지막 캔들 유지)
    DuplicateTimestamp,
    /// OHLC 불일치 또는 0 이하 종가 (제거)
    InconsistentBar,
}

/// 데이터 정제 결과 한 건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIssue {
    pub key: SeriesKey,
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: DataIssueKind,
}

/// 사전 로드된 시장 데이터 전체.
///
/// 데이터 계층에서 로드한 (심볼, 주기)별 캔들 시계열을 보관합니다.
/// 엔진은 이 구조를 통해서만 데이터에 접근하며 I/O를 하지 않습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketDataSet {
    series: BTreeMap<SeriesKey, Vec<Bar>>,
}

impl MarketDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 시계열을 추가합니다. 같은 키가 있으면 교체됩니다.
    pub fn insert(&mut self, key: SeriesKey, bars: Vec<Bar>) {
        self.series.insert(key, bars);
    }

    /// 빌더 형태의 시계열 추가.
    pub fn with_series(mut self, key: SeriesKey, bars: Vec<Bar>) -> Self {
        self.insert(key, bars);
        self
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&[Bar]> {
        self.series.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.series.keys()
    }

    /// 데이터가 존재하는 심볼 목록.
    pub fn symbols(&self) -> BTreeSet<&str> {
        self.series.keys().map(|k| k.symbol.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    /// 전체 캔들 수.
    pub fn bar_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    /// 조건을 만족하는 캔들만 남긴 사본을 만듭니다.
    pub fn filtered<F>(&self, mut keep_series: impl FnMut(&SeriesKey) -> bool, mut keep_bar: F) -> Self
    where
        F: FnMut(&Bar) -> bool,
    {
        let series = self
            .series
            .iter()
            .filter(|(key, _)| keep_series(key))
            .map(|(key, bars)| {
                let bars = bars.iter().filter(|b| keep_bar(b)).cloned().collect();
                (key.clone(), bars)
            })
            .collect();
        Self { series }
    }

    /// 시계열을 정렬하고 중복/불량 캔들을 제거합니다.
    ///
    /// 발견한 문제 목록을 반환합니다. 어떤 입력에도 패닉하지 않습니다.
    pub fn sanitize(&mut self) -> Vec<DataIssue> {
        let mut issues = Vec::new();

        for (key, bars) in self.series.iter_mut() {
            if bars.windows(2).any(|w| w[0].timestamp > w[1].timestamp) {
                issues.push(DataIssue {
                    key: key.clone(),
                    timestamp: None,
                    kind: DataIssueKind::Unsorted,
                });
                // 안정 정렬: 같은 시각이면 나중에 들어온 캔들이 뒤에 남음
                bars.sort_by_key(|b| b.timestamp);
            }

            let mut cleaned: Vec<Bar> = Vec::with_capacity(bars.len());
            for bar in bars.drain(..) {
                if !bar.is_consistent() {
                    issues.push(DataIssue {
                        key: key.clone(),
                        timestamp: Some(bar.timestamp),
                        kind: DataIssueKind::InconsistentBar,
                    });
                    continue;
                }
                match cleaned.last_mut() {
                    Some(last) if last.timestamp == bar.timestamp => {
                        issues.push(DataIssue {
                            key: key.clone(),
                            timestamp: Some(bar.timestamp),
                            kind: DataIssueKind::DuplicateTimestamp,
                        });
                        *last = bar;
                    }
                    _ => cleaned.push(bar),
                }
            }
            *bars = cleaned;
        }

        issues
    }

    /// 모든 시계열 시각의 합집합 (오름차순, 중복 제거).
    pub fn timeline(&self) -> Vec<DateTime<Utc>> {
        let set: BTreeSet<DateTime<Utc>> = self
            .series
            .values()
            .flat_map(|bars| bars.iter().map(|b| b.timestamp))
            .collect();
        set.into_iter().collect()
    }

    /// 시각 `t` 기준 뷰를 만듭니다.
    pub fn view_at(&self, t: DateTime<Utc>) -> MarketView<'_> {
        MarketView::as_of(self, t)
    }
}

/// 특정 시각 기준의 시장 데이터 뷰.
///
/// 각 시계열은 `timestamp ≤ t` 인 캔들까지만 슬라이스로 노출됩니다.
/// 아직 데이터가 없는 시계열은 뷰에 포함되지 않습니다.
#[derive(Debug, Clone)]
pub struct MarketView<'a> {
    timestamp: DateTime<Utc>,
    series: BTreeMap<&'a SeriesKey, &'a [Bar]>,
}

impl<'a> MarketView<'a> {
    /// `data`에서 시각 `t`까지의 뷰를 만듭니다.
    pub fn as_of(data: &'a MarketDataSet, t: DateTime<Utc>) -> Self {
        let series = data
            .series
            .iter()
            .filter_map(|(key, bars)| {
                let end = bars.partition_point(|b| b.timestamp <= t);
                (end > 0).then(|| (key, &bars[..end]))
            })
            .collect();
        Self {
            timestamp: t,
            series,
        }
    }

    /// 뷰 기준 시각.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// 데이터가 있는 심볼 목록 (정렬, 중복 제거).
    pub fn symbols(&self) -> Vec<&'a str> {
        let set: BTreeSet<&'a str> = self.series.keys().map(|k| k.symbol.as_str()).collect();
        set.into_iter().collect()
    }

    /// 심볼에 데이터가 있는지 확인합니다.
    pub fn contains(&self, symbol: &str) -> bool {
        self.series.keys().any(|k| k.symbol == symbol)
    }

    /// (심볼, 주기) 시계열의 지금까지 이력.
    pub fn history(&self, symbol: &str, timeframe: Timeframe) -> Option<&'a [Bar]> {
        self.series
            .iter()
            .find(|(k, _)| k.symbol == symbol && k.timeframe == timeframe)
            .map(|(_, bars)| *bars)
    }

    /// 심볼의 가장 최근 캔들 (주기 무관, 동일 시각이면 짧은 주기 우선).
    pub fn latest_bar(&self, symbol: &str) -> Option<&'a Bar> {
        let mut best: Option<&'a Bar> = None;
        // BTreeMap 순서상 같은 심볼은 짧은 주기부터 순회됨
        for (key, bars) in &self.series {
            if key.symbol != symbol {
                continue;
            }
            if let Some(bar) = bars.last() {
                if best.map_or(true, |b| bar.timestamp > b.timestamp) {
                    best = Some(bar);
                }
            }
        }
        best
    }

    /// 심볼의 현재 가격 (최근 캔들 종가).
    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.latest_bar(symbol).map(|b| b.close)
    }

    /// 모든 (키, 이력) 쌍.
    pub fn iter(&self) -> impl Iterator<Item = (&'a SeriesKey, &'a [Bar])> + '_ {
        self.series.iter().map(|(k, v)| (*k, *v))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    use super::*;

    fn ts(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn bars(hours: &[i64], price: Decimal) -> Vec<Bar> {
        hours.iter().map(|h| Bar::flat(ts(*h), price, dec!(1))).collect()
    }

    #[test]
    fn test_timeline_is_merged_and_deduplicated() {
        let data = MarketDataSet::new()
            .with_series(SeriesKey::new("BTC", Timeframe::H1), bars(&[0, 1, 2], dec!(100)))
            .with_series(SeriesKey::new("ETH", Timeframe::H1), bars(&[1, 3], dec!(10)));

        assert_eq!(data.timeline(), vec![ts(0), ts(1), ts(2), ts(3)]);
    }

    #[test]
    fn test_view_carries_forward_and_omits_missing_symbols() {
        let data = MarketDataSet::new()
            .with_series(SeriesKey::new("BTC", Timeframe::H1), bars(&[0, 1], dec!(100)))
            .with_series(SeriesKey::new("ETH", Timeframe::H1), bars(&[2], dec!(10)));

        let view = data.view_at(ts(0));
        assert!(view.contains("BTC"));
        assert!(!view.contains("ETH"));

        // BTC 데이터는 1시 이후 없음 → 마지막 캔들을 이어서 사용
        let view = data.view_at(ts(5));
        assert_eq!(view.latest_bar("BTC").unwrap().timestamp, ts(1));
        assert_eq!(view.price("ETH"), Some(dec!(10)));
    }

    #[test]
    fn test_latest_bar_prefers_finer_timeframe_on_tie() {
        let data = MarketDataSet::new()
            .with_series(SeriesKey::new("BTC", Timeframe::H1), bars(&[0], dec!(100)))
            .with_series(SeriesKey::new("BTC", Timeframe::M1), bars(&[0], dec!(101)));

        assert_eq!(data.view_at(ts(0)).price("BTC"), Some(dec!(101)));
    }

    #[test]
    fn test_sanitize_sorts_dedups_and_drops_bad_bars() {
        let key = SeriesKey::new("BTC", Timeframe::H1);
        let mut series = bars(&[2, 0, 1, 1], dec!(100));
        series[3].close = dec!(105);
        series[3].high = dec!(105);
        series.push(Bar::new(ts(3), dec!(100), dec!(90), dec!(80), dec!(95), dec!(1)));

        let mut data = MarketDataSet::new().with_series(key.clone(), series);
        let issues = data.sanitize();

        let bars = data.get(&key).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[1].close, dec!(105));
        assert!(issues.iter().any(|i| i.kind == DataIssueKind::Unsorted));
        assert!(issues.iter().any(|i| i.kind == DataIssueKind::DuplicateTimestamp));
        assert!(issues.iter().any(|i| i.kind == DataIssueKind::InconsistentBar));
    }

    #[test]
    fn test_timeframe_round_trip_from_str() {
        for tf in [Timeframe::M1, Timeframe::H4, Timeframe::D1, Timeframe::W1] {
            assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), tf);
        }
        assert!("7m".parse::<Timeframe>().is_err());
    }

    proptest! {
        #[test]
        fn prop_view_never_looks_ahead(
            hours in proptest::collection::vec(0i64..200, 1..60),
            query in 0i64..220,
        ) {
            let mut data = MarketDataSet::new()
                .with_series(SeriesKey::new("BTC", Timeframe::H1), bars(&hours, dec!(100)))
                .with_series(SeriesKey::new("ETH", Timeframe::M5), bars(&hours, dec!(10)));
            data.sanitize();

            let t = ts(query);
            let view = data.view_at(t);
            for (_, history) in view.iter() {
                prop_assert!(!history.is_empty());
                prop_assert!(history.iter().all(|b| b.timestamp <= t));
            }
        }
    }
}
