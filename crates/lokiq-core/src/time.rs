//! Time resolution: turning date expressions into backend nanosecond bounds.
//!
//! A [`DateExpr`] is either an absolute instant or a relative expression such
//! as `now-1h` or `now/d`. Relative expressions are evaluated by a
//! [`DateMath`] implementation against the instant reported by a [`Clock`];
//! [`GrafanaDateMath`] is the stock evaluator.

use crate::error::QueryError;
use chrono::{DateTime, Datelike, Months, NaiveDate, TimeDelta, Timelike, Utc};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Date expressions
// ---------------------------------------------------------------------------

/// A point in time as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateExpr {
    Absolute(DateTime<Utc>),
    /// e.g. `now`, `now-15m`, `now-1d/d`, `2024-01-15T10:00:00Z||+1h`.
    Relative(String),
}

impl From<DateTime<Utc>> for DateExpr {
    fn from(dt: DateTime<Utc>) -> Self {
        DateExpr::Absolute(dt)
    }
}

impl From<&str> for DateExpr {
    fn from(s: &str) -> Self {
        DateExpr::Relative(s.to_string())
    }
}

impl From<String> for DateExpr {
    fn from(s: String) -> Self {
        DateExpr::Relative(s)
    }
}

/// The `[from, to]` range a historical query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateExpr,
    pub to: DateExpr,
}

impl TimeRange {
    pub fn new(from: impl Into<DateExpr>, to: impl Into<DateExpr>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// `[now-<span>, now]`, e.g. `TimeRange::last("1h")`.
    pub fn last(span: &str) -> Self {
        Self::new(format!("now-{span}"), "now")
    }
}

// ---------------------------------------------------------------------------
// Date math
// ---------------------------------------------------------------------------

/// Evaluates relative date expressions.
pub trait DateMath: Send + Sync {
    /// Evaluate `expr` against `now`. `round_up` selects the end rather than
    /// the start of any `/unit` rounding.
    fn parse(&self, expr: &str, round_up: bool, now: DateTime<Utc>) -> Result<DateTime<Utc>, QueryError>;
}

/// Grafana-style date math: an anchor (`now`, an RFC 3339 instant followed by
/// `||`, or epoch milliseconds) followed by any number of `+N<unit>` /
/// `-N<unit>` steps and `/<unit>` roundings. Units are `s m h d w M y`;
/// weeks start on Monday.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrafanaDateMath;

impl DateMath for GrafanaDateMath {
    fn parse(&self, expr: &str, round_up: bool, now: DateTime<Utc>) -> Result<DateTime<Utc>, QueryError> {
        let text = expr.trim();
        let invalid = |reason: &str| QueryError::InvalidTimeExpression {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let (anchor, math) = if let Some(rest) = text.strip_prefix("now") {
            (now, rest)
        } else {
            let (date, math) = match text.find("||") {
                Some(idx) => (&text[..idx], &text[idx + 2..]),
                None => (text, ""),
            };
            (parse_absolute(date).ok_or_else(|| invalid("unrecognised date"))?, math)
        };

        apply_math(anchor, math, round_up).map_err(|reason| invalid(&reason))
    }
}

fn parse_absolute(date: &str) -> Option<DateTime<Utc>> {
    if date.is_empty() {
        return None;
    }
    if date.bytes().all(|b| b.is_ascii_digit()) {
        return DateTime::from_timestamp_millis(date.parse().ok()?);
    }
    DateTime::parse_from_rfc3339(date)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn apply_math(mut time: DateTime<Utc>, math: &str, round_up: bool) -> Result<DateTime<Utc>, String> {
    let chars: Vec<char> = math.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let op = chars[i];
        i += 1;
        if !matches!(op, '/' | '+' | '-') {
            return Err(format!("unexpected {op:?}"));
        }

        let mut amount: i64 = 1;
        if op != '/' {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                let digits: String = chars[start..i].iter().collect();
                amount = digits.parse().map_err(|_| format!("bad amount {digits:?}"))?;
            }
        }

        let unit = *chars.get(i).ok_or_else(|| "missing unit".to_string())?;
        i += 1;
        if !matches!(unit, 's' | 'm' | 'h' | 'd' | 'w' | 'M' | 'y') {
            return Err(format!("unknown unit {unit:?}"));
        }

        let next = match op {
            '/' if round_up => end_of(time, unit),
            '/' => start_of(time, unit),
            '+' => shift(time, unit, amount),
            _ => shift(time, unit, -amount),
        };
        time = next.ok_or_else(|| "result out of range".to_string())?;
    }
    Ok(time)
}

fn start_of(t: DateTime<Utc>, unit: char) -> Option<DateTime<Utc>> {
    let day = t.date_naive();
    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    match unit {
        's' => t.with_nanosecond(0),
        'm' => t.with_second(0)?.with_nanosecond(0),
        'h' => t.with_minute(0)?.with_second(0)?.with_nanosecond(0),
        'd' => midnight(day),
        'w' => midnight(day - TimeDelta::days(day.weekday().num_days_from_monday() as i64)),
        'M' => midnight(NaiveDate::from_ymd_opt(day.year(), day.month(), 1)?),
        'y' => midnight(NaiveDate::from_ymd_opt(day.year(), 1, 1)?),
        _ => None,
    }
}

fn end_of(t: DateTime<Utc>, unit: char) -> Option<DateTime<Utc>> {
    shift(start_of(t, unit)?, unit, 1)?.checked_sub_signed(TimeDelta::milliseconds(1))
}

fn shift(t: DateTime<Utc>, unit: char, amount: i64) -> Option<DateTime<Utc>> {
    let delta = match unit {
        's' => TimeDelta::try_seconds(amount)?,
        'm' => TimeDelta::try_minutes(amount)?,
        'h' => TimeDelta::try_hours(amount)?,
        'd' => TimeDelta::try_days(amount)?,
        'w' => TimeDelta::try_weeks(amount)?,
        'M' => return shift_months(t, amount),
        'y' => return shift_months(t, amount.checked_mul(12)?),
        _ => return None,
    };
    t.checked_add_signed(delta)
}

fn shift_months(t: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let n = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        t.checked_add_months(n)
    } else {
        t.checked_sub_months(n)
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Converts [`DateExpr`]s to nanosecond epoch timestamps.
#[derive(Clone)]
pub struct TimeResolver {
    date_math: Arc<dyn DateMath>,
    clock: Arc<dyn Clock>,
}

impl TimeResolver {
    pub fn new(date_math: Arc<dyn DateMath>, clock: Arc<dyn Clock>) -> Self {
        Self { date_math, clock }
    }

    /// Stock date math against the wall clock.
    pub fn system() -> Self {
        Self::new(Arc::new(GrafanaDateMath), Arc::new(SystemClock))
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Resolve `date` to nanoseconds since the epoch.
    ///
    /// Absolute instants ignore `round_up`; relative expressions pass it to
    /// the date-math evaluator. Either way the instant's millisecond epoch is
    /// scaled by 1e6, so an inclusive upper bound never truncates a sample
    /// inside its last millisecond.
    pub fn resolve(&self, date: &DateExpr, round_up: bool) -> Result<i64, QueryError> {
        let moment = match date {
            DateExpr::Absolute(dt) => *dt,
            DateExpr::Relative(expr) => self.date_math.parse(expr, round_up, self.clock.now())?,
        };
        millis_to_ns(moment)
    }
}

/// Nanosecond epoch of `moment`, at millisecond precision.
pub fn millis_to_ns(moment: DateTime<Utc>) -> Result<i64, QueryError> {
    moment
        .timestamp_millis()
        .checked_mul(1_000_000)
        .ok_or_else(|| QueryError::InvalidTimeExpression {
            expr: moment.to_rfc3339(),
            reason: "outside the nanosecond timestamp range".to_string(),
        })
}
