// ============================================================================
// spark-tracked - ReactiveDate
// A point in time backed by one epoch cell and memoized accessors
// ============================================================================
//
// The native value is epoch milliseconds in a `Tracked<i64>`. Every
// zero-argument accessor is a `DateMethod`; the first call of a method
// creates a derived that reads the epoch cell and computes the method, later
// calls hit that derived. Setters compute the candidate time, validate it and
// then write the epoch cell once, so a rejected write changes nothing.
// ============================================================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::core::constants::MAX_TIME_MS;
use crate::error::{Error, Result};
use crate::primitives::block::{Block, BlockInner};
use crate::primitives::derived::{Derived, DerivedOptions};
use crate::primitives::scope::safe_scope;
use crate::primitives::tracked::Tracked;

const MS_PER_SECOND: i128 = 1_000;
const MS_PER_MINUTE: i128 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i128 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i128 = 24 * MS_PER_HOUR;

/// `NaiveDate::num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i128 = 719_163;

#[cfg(test)]
thread_local! {
    static NATIVE_CALLS: std::cell::Cell<u32> = const { std::cell::Cell::new(0) };
}

// =============================================================================
// DATE METHOD - the accessor table
// =============================================================================

/// Result of a memoized accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateValue {
    Number(i64),
    Text(String),
}

/// Every zero-argument accessor of a [`ReactiveDate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateMethod {
    FullYear,
    Month,
    Date,
    Day,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    UtcFullYear,
    UtcMonth,
    UtcDate,
    UtcDay,
    UtcHours,
    UtcMinutes,
    UtcSeconds,
    UtcMilliseconds,
    Time,
    ValueOf,
    TimezoneOffset,
    IsoString,
    Json,
    String,
    DateString,
    TimeString,
    UtcString,
    LocaleString,
    LocaleDateString,
    LocaleTimeString,
}

impl DateMethod {
    /// Evaluate the accessor at `ms`.
    pub fn compute(self, ms: i64) -> DateValue {
        #[cfg(test)]
        NATIVE_CALLS.with(|calls| calls.set(calls.get() + 1));

        let utc = utc_datetime(ms);
        let local = utc.with_timezone(&Local);
        let number = |n: i64| DateValue::Number(n);

        match self {
            Self::FullYear => number(local.year().into()),
            Self::Month => number(local.month0().into()),
            Self::Date => number(local.day().into()),
            Self::Day => number(local.weekday().num_days_from_sunday().into()),
            Self::Hours => number(local.hour().into()),
            Self::Minutes => number(local.minute().into()),
            Self::Seconds => number(local.second().into()),
            Self::Milliseconds => number(local.timestamp_subsec_millis().into()),
            Self::UtcFullYear => number(utc.year().into()),
            Self::UtcMonth => number(utc.month0().into()),
            Self::UtcDate => number(utc.day().into()),
            Self::UtcDay => number(utc.weekday().num_days_from_sunday().into()),
            Self::UtcHours => number(utc.hour().into()),
            Self::UtcMinutes => number(utc.minute().into()),
            Self::UtcSeconds => number(utc.second().into()),
            Self::UtcMilliseconds => number(utc.timestamp_subsec_millis().into()),
            Self::Time | Self::ValueOf => number(ms),
            Self::TimezoneOffset => number(-i64::from(local.offset().local_minus_utc()) / 60),
            Self::IsoString | Self::Json => DateValue::Text(iso_string(&utc)),
            Self::String => DateValue::Text(local.format("%a %b %d %Y %H:%M:%S GMT%z").to_string()),
            Self::DateString => DateValue::Text(local.format("%a %b %d %Y").to_string()),
            Self::TimeString => DateValue::Text(local.format("%H:%M:%S GMT%z").to_string()),
            Self::UtcString => DateValue::Text(utc.format("%a, %d %b %Y %H:%M:%S GMT").to_string()),
            Self::LocaleString => DateValue::Text(local.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()),
            Self::LocaleDateString => DateValue::Text(local.format("%-m/%-d/%Y").to_string()),
            Self::LocaleTimeString => DateValue::Text(local.format("%-I:%M:%S %p").to_string()),
        }
    }
}

/// `ms` is range-checked on every write, so the conversion cannot fail for a
/// value held by a `ReactiveDate`.
fn utc_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// ISO 8601 with millisecond precision; years outside 0..=9999 use the
/// six-digit signed form.
fn iso_string(utc: &DateTime<Utc>) -> String {
    let year = utc.year();
    let year = if (0..=9999).contains(&year) {
        format!("{year:04}")
    } else {
        format!("{year:+07}")
    };
    format!("{year}-{}", utc.format("%m-%dT%H:%M:%S%.3fZ"))
}

fn check_time(ms: i64) -> Result<i64> {
    if ms.unsigned_abs() > MAX_TIME_MS.unsigned_abs() || DateTime::from_timestamp_millis(ms).is_none() {
        return Err(Error::InvalidTimestamp(ms));
    }
    Ok(ms)
}

// =============================================================================
// CALENDAR FIELDS - setter arithmetic
// =============================================================================

#[derive(Clone, Copy)]
enum Frame {
    Utc,
    Local,
}

/// Broken-down time. Fields may hold out-of-range values while a setter
/// works; `to_naive_ms` normalizes them the way date arithmetic rolls over
/// (month 12 is January of the next year, day 0 the last day of the
/// previous month).
struct Fields {
    year: i64,
    month: i64,
    day: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
    millis: i64,
}

impl Fields {
    fn from_naive(naive: &NaiveDateTime) -> Self {
        Self {
            year: naive.year().into(),
            month: naive.month0().into(),
            day: naive.day().into(),
            hours: naive.hour().into(),
            minutes: naive.minute().into(),
            seconds: naive.second().into(),
            millis: (naive.nanosecond() / 1_000_000).into(),
        }
    }

    fn to_naive_ms(&self) -> Result<i64> {
        let year = i128::from(self.year) + i128::from(self.month.div_euclid(12));
        let month = self.month.rem_euclid(12) as u32 + 1;
        let year = i32::try_from(year).map_err(|_| Error::InvalidDate)?;
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(Error::InvalidDate)?;

        let days = i128::from(first.num_days_from_ce()) - UNIX_EPOCH_DAYS_FROM_CE + i128::from(self.day) - 1;
        let ms = days * MS_PER_DAY
            + i128::from(self.hours) * MS_PER_HOUR
            + i128::from(self.minutes) * MS_PER_MINUTE
            + i128::from(self.seconds) * MS_PER_SECOND
            + i128::from(self.millis);
        i64::try_from(ms).map_err(|_| Error::InvalidDate)
    }
}

impl Frame {
    fn to_naive(self, ms: i64) -> NaiveDateTime {
        let utc = utc_datetime(ms);
        match self {
            Self::Utc => utc.naive_utc(),
            Self::Local => utc.with_timezone(&Local).naive_local(),
        }
    }

    /// Map wall-clock milliseconds in this frame back to epoch milliseconds.
    fn to_epoch(self, naive_ms: i64) -> Result<i64> {
        match self {
            Self::Utc => Ok(naive_ms),
            Self::Local => {
                let naive = DateTime::from_timestamp_millis(naive_ms)
                    .ok_or(Error::InvalidTimestamp(naive_ms))?
                    .naive_utc();
                match Local.from_local_datetime(&naive).earliest() {
                    Some(local) => Ok(local.timestamp_millis()),
                    // Skipped by a DST transition: shift by the offset in force
                    None => {
                        let offset = Local.offset_from_utc_datetime(&naive).local_minus_utc();
                        Ok(naive_ms - i64::from(offset) * 1_000)
                    }
                }
            }
        }
    }
}

// =============================================================================
// REACTIVE DATE
// =============================================================================

struct DateInner {
    time: Tracked<i64>,
    cache: RefCell<HashMap<DateMethod, Derived<DateValue>>>,
    block: Option<Weak<BlockInner>>,
}

/// A date whose accessors are reactive and memoized.
///
/// # Example
///
/// ```
/// use spark_tracked::ReactiveDate;
///
/// let date = ReactiveDate::parse("2024-03-05T10:20:30.456Z").unwrap();
/// assert_eq!(date.get_utc_full_year(), 2024);
/// assert_eq!(date.get_utc_month(), 2); // zero-based
///
/// date.set_utc_month(12).unwrap(); // rolls into the next year
/// assert_eq!(date.get_utc_full_year(), 2025);
/// assert_eq!(date.get_utc_month(), 0);
/// ```
pub struct ReactiveDate {
    inner: Rc<DateInner>,
}

impl Clone for ReactiveDate {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl ReactiveDate {
    /// The current time, owned by the ambient scope.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// A date at `ms` milliseconds since the epoch.
    pub fn from_timestamp_millis(ms: i64) -> Result<Self> {
        Self::new_in(&safe_scope(), ms)
    }

    /// A date at `ms`, owned by `block`.
    pub fn new_in(block: &Block, ms: i64) -> Result<Self> {
        let ms = check_time(ms)?;
        Ok(Self::with_owner(ms, Some(block.downgrade_inner())))
    }

    /// A date at the instant `dt` describes.
    pub fn from_datetime<Tz: TimeZone>(dt: DateTime<Tz>) -> Self {
        Self::with_owner(dt.timestamp_millis(), Some(safe_scope().downgrade_inner()))
    }

    /// Parse RFC 3339, a bare `YYYY-MM-DD` (UTC midnight) or a
    /// `YYYY-MM-DDTHH:MM[:SS[.fff]]` without offset (local time).
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Self::from_timestamp_millis(dt.timestamp_millis());
        }
        if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            let midnight = date.and_hms_opt(0, 0, 0).ok_or(Error::InvalidDate)?;
            return Self::from_timestamp_millis(midnight.and_utc().timestamp_millis());
        }
        for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(input, pattern) {
                let naive_ms = naive.and_utc().timestamp_millis();
                return Self::from_timestamp_millis(Frame::Local.to_epoch(naive_ms)?);
            }
        }
        Err(Error::InvalidDate)
    }

    fn with_owner(ms: i64, block: Option<Weak<BlockInner>>) -> Self {
        Self {
            inner: Rc::new(DateInner {
                time: Tracked::with_owner(ms, crate::core::types::default_equals, block.clone()),
                cache: RefCell::new(HashMap::new()),
                block,
            }),
        }
    }

    /// Block that owns this date's cells, if it is still alive.
    pub fn block(&self) -> Option<Block> {
        self.inner
            .block
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Block::from_inner)
    }

    // =========================================================================
    // MEMOIZED ACCESSORS
    // =========================================================================

    /// Read an accessor through its memo, creating the memo on first use.
    pub fn get(&self, method: DateMethod) -> DateValue {
        let memo = self.inner.cache.borrow().get(&method).cloned();
        let memo = match memo {
            Some(memo) => memo,
            None => {
                let time = self.inner.time.clone();
                let memo = Derived::with_owner(
                    move || method.compute(time.get()),
                    DerivedOptions::default(),
                    self.inner.block.clone(),
                );
                self.inner.cache.borrow_mut().insert(method, memo.clone());
                memo
            }
        };
        memo.get()
    }

    fn number(&self, method: DateMethod) -> i64 {
        match self.get(method) {
            DateValue::Number(n) => n,
            DateValue::Text(_) => unreachable!("{method:?} yields a number"),
        }
    }

    fn text(&self, method: DateMethod) -> String {
        match self.get(method) {
            DateValue::Text(s) => s,
            DateValue::Number(_) => unreachable!("{method:?} yields text"),
        }
    }

    pub fn get_full_year(&self) -> i64 {
        self.number(DateMethod::FullYear)
    }

    /// Zero-based month in local time.
    pub fn get_month(&self) -> i64 {
        self.number(DateMethod::Month)
    }

    /// Day of the month in local time.
    pub fn get_date(&self) -> i64 {
        self.number(DateMethod::Date)
    }

    /// Day of the week in local time, 0 for Sunday.
    pub fn get_day(&self) -> i64 {
        self.number(DateMethod::Day)
    }

    pub fn get_hours(&self) -> i64 {
        self.number(DateMethod::Hours)
    }

    pub fn get_minutes(&self) -> i64 {
        self.number(DateMethod::Minutes)
    }

    pub fn get_seconds(&self) -> i64 {
        self.number(DateMethod::Seconds)
    }

    pub fn get_milliseconds(&self) -> i64 {
        self.number(DateMethod::Milliseconds)
    }

    pub fn get_utc_full_year(&self) -> i64 {
        self.number(DateMethod::UtcFullYear)
    }

    pub fn get_utc_month(&self) -> i64 {
        self.number(DateMethod::UtcMonth)
    }

    pub fn get_utc_date(&self) -> i64 {
        self.number(DateMethod::UtcDate)
    }

    pub fn get_utc_day(&self) -> i64 {
        self.number(DateMethod::UtcDay)
    }

    pub fn get_utc_hours(&self) -> i64 {
        self.number(DateMethod::UtcHours)
    }

    pub fn get_utc_minutes(&self) -> i64 {
        self.number(DateMethod::UtcMinutes)
    }

    pub fn get_utc_seconds(&self) -> i64 {
        self.number(DateMethod::UtcSeconds)
    }

    pub fn get_utc_milliseconds(&self) -> i64 {
        self.number(DateMethod::UtcMilliseconds)
    }

    /// Milliseconds since the epoch.
    pub fn get_time(&self) -> i64 {
        self.number(DateMethod::Time)
    }

    pub fn value_of(&self) -> i64 {
        self.number(DateMethod::ValueOf)
    }

    /// Minutes to add to local time to get UTC.
    pub fn get_timezone_offset(&self) -> i64 {
        self.number(DateMethod::TimezoneOffset)
    }

    pub fn to_iso_string(&self) -> String {
        self.text(DateMethod::IsoString)
    }

    pub fn to_json(&self) -> String {
        self.text(DateMethod::Json)
    }

    pub fn to_date_string(&self) -> String {
        self.text(DateMethod::DateString)
    }

    pub fn to_time_string(&self) -> String {
        self.text(DateMethod::TimeString)
    }

    pub fn to_utc_string(&self) -> String {
        self.text(DateMethod::UtcString)
    }

    pub fn to_locale_string(&self) -> String {
        self.text(DateMethod::LocaleString)
    }

    pub fn to_locale_date_string(&self) -> String {
        self.text(DateMethod::LocaleDateString)
    }

    pub fn to_locale_time_string(&self) -> String {
        self.text(DateMethod::LocaleTimeString)
    }

    // =========================================================================
    // UNCACHED ACCESSORS
    // =========================================================================

    /// Format in UTC with a strftime-style pattern. Not memoized: the result
    /// depends on the argument.
    pub fn format(&self, pattern: &str) -> Result<String> {
        Self::format_with(pattern, utc_datetime(self.inner.time.get()))
    }

    /// Format in local time with a strftime-style pattern.
    pub fn format_local(&self, pattern: &str) -> Result<String> {
        Self::format_with(pattern, utc_datetime(self.inner.time.get()).with_timezone(&Local))
    }

    fn format_with<Tz: TimeZone>(pattern: &str, dt: DateTime<Tz>) -> Result<String>
    where
        Tz::Offset: fmt::Display,
    {
        if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
            return Err(Error::InvalidFormat(pattern.to_string()));
        }
        Ok(dt.format_with_items(StrftimeItems::new(pattern)).to_string())
    }

    // =========================================================================
    // SETTERS
    // =========================================================================

    /// Set milliseconds since the epoch. Returns the new time.
    pub fn set_time(&self, ms: i64) -> Result<i64> {
        let ms = check_time(ms)?;
        self.inner.time.set(ms);
        Ok(ms)
    }

    fn set_field(&self, frame: Frame, apply: impl FnOnce(&mut Fields)) -> Result<i64> {
        let current = self.inner.time.peek();
        let mut fields = Fields::from_naive(&frame.to_naive(current));
        apply(&mut fields);
        let next = frame.to_epoch(fields.to_naive_ms()?)?;
        self.set_time(next)
    }

    pub fn set_milliseconds(&self, ms: i64) -> Result<i64> {
        self.set_field(Frame::Local, |f| f.millis = ms)
    }

    pub fn set_seconds(&self, seconds: i64) -> Result<i64> {
        self.set_field(Frame::Local, |f| f.seconds = seconds)
    }

    pub fn set_minutes(&self, minutes: i64) -> Result<i64> {
        self.set_field(Frame::Local, |f| f.minutes = minutes)
    }

    pub fn set_hours(&self, hours: i64) -> Result<i64> {
        self.set_field(Frame::Local, |f| f.hours = hours)
    }

    /// Set the day of the month; 0 is the last day of the previous month.
    pub fn set_date(&self, day: i64) -> Result<i64> {
        self.set_field(Frame::Local, |f| f.day = day)
    }

    /// Set the zero-based month; out-of-range values roll the year.
    pub fn set_month(&self, month: i64) -> Result<i64> {
        self.set_field(Frame::Local, |f| f.month = month)
    }

    pub fn set_full_year(&self, year: i64) -> Result<i64> {
        self.set_field(Frame::Local, |f| f.year = year)
    }

    pub fn set_utc_milliseconds(&self, ms: i64) -> Result<i64> {
        self.set_field(Frame::Utc, |f| f.millis = ms)
    }

    pub fn set_utc_seconds(&self, seconds: i64) -> Result<i64> {
        self.set_field(Frame::Utc, |f| f.seconds = seconds)
    }

    pub fn set_utc_minutes(&self, minutes: i64) -> Result<i64> {
        self.set_field(Frame::Utc, |f| f.minutes = minutes)
    }

    pub fn set_utc_hours(&self, hours: i64) -> Result<i64> {
        self.set_field(Frame::Utc, |f| f.hours = hours)
    }

    pub fn set_utc_date(&self, day: i64) -> Result<i64> {
        self.set_field(Frame::Utc, |f| f.day = day)
    }

    pub fn set_utc_month(&self, month: i64) -> Result<i64> {
        self.set_field(Frame::Utc, |f| f.month = month)
    }

    pub fn set_utc_full_year(&self, year: i64) -> Result<i64> {
        self.set_field(Frame::Utc, |f| f.year = year)
    }
}

impl fmt::Display for ReactiveDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text(DateMethod::String))
    }
}

impl fmt::Debug for ReactiveDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReactiveDate")
            .field(&iso_string(&utc_datetime(self.inner.time.peek())))
            .finish()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ReactiveDate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_json())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::block::{effect, root};
    use crate::reactivity::scheduling::flush_sync;
    use std::cell::Cell;

    /// 2024-03-05T10:20:30.456Z, a Tuesday
    const SAMPLE_MS: i64 = 1_709_634_030_456;

    fn native_calls() -> u32 {
        NATIVE_CALLS.with(Cell::get)
    }

    #[test]
    fn utc_accessors() {
        let d = ReactiveDate::from_timestamp_millis(SAMPLE_MS).unwrap();
        assert_eq!(d.get_utc_full_year(), 2024);
        assert_eq!(d.get_utc_month(), 2);
        assert_eq!(d.get_utc_date(), 5);
        assert_eq!(d.get_utc_day(), 2);
        assert_eq!(d.get_utc_hours(), 10);
        assert_eq!(d.get_utc_minutes(), 20);
        assert_eq!(d.get_utc_seconds(), 30);
        assert_eq!(d.get_utc_milliseconds(), 456);
        assert_eq!(d.get_time(), SAMPLE_MS);
        assert_eq!(d.value_of(), SAMPLE_MS);
    }

    #[test]
    fn string_forms() {
        let d = ReactiveDate::from_timestamp_millis(SAMPLE_MS).unwrap();
        assert_eq!(d.to_iso_string(), "2024-03-05T10:20:30.456Z");
        assert_eq!(d.to_json(), d.to_iso_string());
        assert_eq!(d.to_utc_string(), "Tue, 05 Mar 2024 10:20:30 GMT");
    }

    #[test]
    fn local_fields_agree_with_offset() {
        let d = ReactiveDate::from_timestamp_millis(SAMPLE_MS).unwrap();
        let utc_minutes = d.get_utc_hours() * 60 + d.get_utc_minutes();
        let local_minutes = d.get_hours() * 60 + d.get_minutes();
        assert_eq!(
            (utc_minutes - d.get_timezone_offset()).rem_euclid(1440),
            local_minutes
        );
    }

    #[test]
    fn accessor_is_memoized_until_set() {
        let d = ReactiveDate::from_timestamp_millis(SAMPLE_MS).unwrap();
        let before = native_calls();
        assert_eq!(d.get_full_year(), 2024);
        assert_eq!(d.get_full_year(), 2024);
        assert_eq!(native_calls() - before, 1);

        d.set_full_year(2030).unwrap();
        assert_eq!(d.get_full_year(), 2030);
        assert_eq!(native_calls() - before, 2);
    }

    #[test]
    fn setters_roll_over() {
        let d = ReactiveDate::from_timestamp_millis(SAMPLE_MS).unwrap();

        d.set_utc_date(0).unwrap();
        assert_eq!((d.get_utc_month(), d.get_utc_date()), (1, 29));

        d.set_utc_hours(25).unwrap();
        assert_eq!((d.get_utc_month(), d.get_utc_date(), d.get_utc_hours()), (2, 1, 1));

        d.set_utc_month(-1).unwrap();
        assert_eq!((d.get_utc_full_year(), d.get_utc_month()), (2023, 11));
    }

    #[test]
    fn rejected_setter_changes_nothing() {
        let d = ReactiveDate::from_timestamp_millis(SAMPLE_MS).unwrap();
        let version = d.inner.time.version();

        assert_eq!(d.set_time(MAX_TIME_MS + 1), Err(Error::InvalidTimestamp(MAX_TIME_MS + 1)));
        assert!(d.set_utc_full_year(i64::MAX).is_err());

        assert_eq!(d.get_time(), SAMPLE_MS);
        assert_eq!(d.inner.time.version(), version);
    }

    #[test]
    fn effect_reacts_to_setter() {
        let d = ReactiveDate::from_timestamp_millis(SAMPLE_MS).unwrap();
        let runs = Rc::new(Cell::new(0));
        let (d2, r) = (d.clone(), runs.clone());
        let _b = root(move || {
            effect(move || {
                let _ = d2.get_utc_month();
                r.set(r.get() + 1);
            });
        });
        flush_sync();

        // Same instant: the epoch cell does not change
        d.set_time(SAMPLE_MS).unwrap();
        flush_sync();
        assert_eq!(runs.get(), 1);

        // Different time, same month: the memo stops the propagation
        d.set_utc_hours(3).unwrap();
        flush_sync();
        assert_eq!(runs.get(), 1);

        d.set_utc_month(5).unwrap();
        flush_sync();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn parse_forms() {
        let date_only = ReactiveDate::parse("2024-01-01").unwrap();
        assert_eq!(date_only.get_time(), 1_704_067_200_000);

        let offset = ReactiveDate::parse("2024-01-01T01:00:00+01:00").unwrap();
        assert_eq!(offset.get_time(), 1_704_067_200_000);

        assert_eq!(ReactiveDate::parse("yesterday").unwrap_err(), Error::InvalidDate);
    }

    #[test]
    fn format_patterns() {
        let d = ReactiveDate::from_timestamp_millis(SAMPLE_MS).unwrap();
        assert_eq!(d.format("%Y/%m/%d").unwrap(), "2024/03/05");
        assert!(matches!(d.format("%Y %!"), Err(Error::InvalidFormat(_))));
    }
}
