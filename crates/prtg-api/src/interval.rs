// Query windows and averaging intervals
//
// PRTG caps the rows a historic-data request returns, so wider windows
// must ask for coarser averaging. The step table is a policy value rather
// than a constant: deployments have disagreed on the exact boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Format of the `sdate` / `edate` query parameters.
pub const PRTG_DATE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Averaging granularity, ordered from finest to coarsest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AggregationInterval {
    /// No averaging: every scan is returned.
    Raw,
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    OneDay,
}

impl AggregationInterval {
    /// Bucket width in seconds; `0` means raw.
    pub fn seconds(self) -> u32 {
        match self {
            Self::Raw => 0,
            Self::OneMinute => 60,
            Self::FiveMinutes => 300,
            Self::FifteenMinutes => 900,
            Self::ThirtyMinutes => 1800,
            Self::OneHour => 3600,
            Self::TwoHours => 7200,
            Self::FourHours => 14_400,
            Self::OneDay => 86_400,
        }
    }

    /// Value of the `avg` query parameter.
    pub fn avg_param(self) -> String {
        self.seconds().to_string()
    }
}

/// One step of the policy: windows up to `max_hours` use `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalStep {
    pub max_hours: f64,
    pub interval: AggregationInterval,
}

/// Deterministic step function from window length to averaging interval.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalPolicy {
    steps: Vec<IntervalStep>,
    fallback: AggregationInterval,
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        use AggregationInterval as A;
        let steps = [
            (12.0, A::Raw),
            (36.0, A::OneMinute),
            (72.0, A::FiveMinutes),
            (168.0, A::FifteenMinutes),
            (336.0, A::ThirtyMinutes),
            (720.0, A::OneHour),
            (1440.0, A::TwoHours),
            (2160.0, A::FourHours),
        ]
        .into_iter()
        .map(|(max_hours, interval)| IntervalStep {
            max_hours,
            interval,
        })
        .collect();
        Self {
            steps,
            fallback: A::OneDay,
        }
    }
}

impl IntervalPolicy {
    /// Build a custom policy.
    ///
    /// Steps must have strictly increasing, positive, finite bounds and
    /// non-decreasing coarseness; the fallback must be at least as coarse
    /// as the last step.
    pub fn new(steps: Vec<IntervalStep>, fallback: AggregationInterval) -> Result<Self, Error> {
        let invalid = |message: String| Error::InvalidConfig { message };
        let mut prev: Option<&IntervalStep> = None;
        for step in &steps {
            if !step.max_hours.is_finite() || step.max_hours <= 0.0 {
                return Err(invalid(format!(
                    "interval threshold must be a positive number of hours, got {}",
                    step.max_hours
                )));
            }
            if let Some(p) = prev {
                if step.max_hours <= p.max_hours {
                    return Err(invalid(format!(
                        "interval thresholds must increase ({} after {})",
                        step.max_hours, p.max_hours
                    )));
                }
                if step.interval < p.interval {
                    return Err(invalid(format!(
                        "interval {} is finer than preceding {}",
                        step.interval, p.interval
                    )));
                }
            }
            prev = Some(step);
        }
        if let Some(p) = prev {
            if fallback < p.interval {
                return Err(invalid(format!(
                    "fallback {fallback} is finer than last step {}",
                    p.interval
                )));
            }
        }
        Ok(Self { steps, fallback })
    }

    pub fn steps(&self) -> &[IntervalStep] {
        &self.steps
    }

    pub fn fallback(&self) -> AggregationInterval {
        self.fallback
    }

    /// Pick the interval for a window of `window_hours`.
    ///
    /// Callers validate `window_hours > 0` through [`QueryWindow`].
    pub fn select(&self, window_hours: f64) -> AggregationInterval {
        self.steps
            .iter()
            .find(|step| window_hours <= step.max_hours)
            .map_or(self.fallback, |step| step.interval)
    }
}

/// A validated `[start, end)` time range with `end > start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl QueryWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, Error> {
        if end <= start {
            return Err(Error::invalid_query(format!(
                "start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Build from Unix epoch milliseconds, as dashboard hosts send them.
    pub fn from_millis(start_ms: i64, end_ms: i64) -> Result<Self, Error> {
        let convert = |ms: i64| {
            DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| Error::invalid_query(format!("timestamp {ms} out of range")))
        };
        Self::new(convert(start_ms)?, convert(end_ms)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Window length in hours (always positive).
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn hours(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 3_600_000.0
    }

    /// `(sdate, edate)` parameter values.
    pub fn prtg_dates(&self) -> (String, String) {
        (
            self.start.format(PRTG_DATE_FORMAT).to_string(),
            self.end.format(PRTG_DATE_FORMAT).to_string(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use strum::IntoEnumIterator;

    fn window_of(hours: i64) -> QueryWindow {
        let start = Utc.with_ymd_and_hms(2025, 2, 14, 0, 0, 0).unwrap();
        QueryWindow::new(start, start + Duration::hours(hours)).unwrap()
    }

    #[test]
    fn canonical_thresholds() {
        let p = IntervalPolicy::default();
        assert_eq!(p.select(0.5), AggregationInterval::Raw);
        assert_eq!(p.select(12.0), AggregationInterval::Raw);
        assert_eq!(p.select(12.01), AggregationInterval::OneMinute);
        assert_eq!(p.select(72.0), AggregationInterval::FiveMinutes);
        assert_eq!(p.select(168.0), AggregationInterval::FifteenMinutes);
        assert_eq!(p.select(336.0), AggregationInterval::ThirtyMinutes);
        assert_eq!(p.select(720.0), AggregationInterval::OneHour);
        assert_eq!(p.select(2160.0), AggregationInterval::FourHours);
        assert_eq!(p.select(2160.5), AggregationInterval::OneDay);
    }

    #[test]
    fn window_scenarios() {
        let p = IntervalPolicy::default();
        assert_eq!(p.select(window_of(24).hours()), AggregationInterval::OneMinute);
        assert_eq!(p.select(window_of(48).hours()), AggregationInterval::FiveMinutes);
        assert_eq!(p.select(window_of(400).hours()), AggregationInterval::OneHour);
        assert_eq!(p.select(window_of(1000).hours()), AggregationInterval::TwoHours);
        assert_eq!(p.select(window_of(3000).hours()), AggregationInterval::OneDay);
    }

    #[test]
    fn selection_is_monotonic_and_pure() {
        let p = IntervalPolicy::default();
        let mut prev = AggregationInterval::Raw;
        for tenth in 1..30_000 {
            let hours = f64::from(tenth) / 10.0;
            let got = p.select(hours);
            assert!(got >= prev, "{hours}h selected {got}, finer than {prev}");
            assert_eq!(got, p.select(hours));
            prev = got;
        }
    }

    #[test]
    fn avg_params_cover_every_interval() {
        let params: Vec<String> = AggregationInterval::iter()
            .map(AggregationInterval::avg_param)
            .collect();
        assert_eq!(
            params,
            ["0", "60", "300", "900", "1800", "3600", "7200", "14400", "86400"]
        );
    }

    #[test]
    fn custom_policy_must_be_monotonic() {
        let step = |max_hours, interval| IntervalStep { max_hours, interval };
        assert!(
            IntervalPolicy::new(
                vec![
                    step(24.0, AggregationInterval::Raw),
                    step(12.0, AggregationInterval::OneHour),
                ],
                AggregationInterval::OneDay,
            )
            .is_err()
        );
        assert!(
            IntervalPolicy::new(
                vec![
                    step(12.0, AggregationInterval::OneHour),
                    step(24.0, AggregationInterval::Raw),
                ],
                AggregationInterval::OneDay,
            )
            .is_err()
        );
        assert!(
            IntervalPolicy::new(
                vec![step(12.0, AggregationInterval::OneHour)],
                AggregationInterval::Raw,
            )
            .is_err()
        );
        let p = IntervalPolicy::new(
            vec![step(24.0, AggregationInterval::Raw)],
            AggregationInterval::OneHour,
        )
        .unwrap();
        assert_eq!(p.select(25.0), AggregationInterval::OneHour);
    }

    #[test]
    fn inverted_or_empty_window_is_rejected() {
        let t = Utc.with_ymd_and_hms(2025, 2, 14, 12, 0, 0).unwrap();
        assert!(matches!(QueryWindow::new(t, t), Err(Error::InvalidQuery { .. })));
        assert!(matches!(
            QueryWindow::new(t, t - Duration::minutes(1)),
            Err(Error::InvalidQuery { .. })
        ));
    }

    #[test]
    fn prtg_date_formatting() {
        let w = QueryWindow::from_millis(1_739_537_340_000, 1_739_540_940_000).unwrap();
        assert_eq!(
            w.prtg_dates(),
            ("2025-02-14-12-49-00".to_owned(), "2025-02-14-13-49-00".to_owned())
        );
        assert!((w.hours() - 1.0).abs() < f64::EPSILON);
    }
}
