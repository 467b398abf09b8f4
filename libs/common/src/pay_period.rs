//! Pay period boundary computation.
//!
//! Maps a cadence policy and a reference date onto the boundaries of the
//! payroll cycle containing (or, for biweekly cadences, following) that date.
//! Everything here is pure: no clock reads, no I/O.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while resolving a policy or computing a range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayPeriodError {
    /// The stored cadence text is not one of the four known kinds.
    #[error("Unsupported pay cadence: {0}")]
    UnsupportedCadence(String),

    /// A biweekly cadence was configured without the anchor date it needs.
    #[error("Biweekly pay cadence requires an anchor date")]
    MissingAnchor,

    /// Week start day outside 0 (Sunday) ..= 6 (Saturday).
    #[error("Week start day must be between 0 and 6, got {0}")]
    InvalidWeekStartDay(i32),

    /// Date arithmetic left the representable calendar.
    #[error("Pay period for {0} is outside the supported date range")]
    OutOfRange(NaiveDate),
}

/// How pay-period boundaries recur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Cadence {
    Weekly,
    Biweekly,
    Semimonthly,
    Monthly,
}

impl Cadence {
    /// Fixed step length in days, for cadences that have one.
    ///
    /// Only these cadences are pre-generated as period records; the
    /// calendar-based ones are computed on demand.
    pub fn step_days(self) -> Option<u64> {
        match self {
            Cadence::Weekly => Some(7),
            Cadence::Biweekly => Some(14),
            Cadence::Semimonthly | Cadence::Monthly => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Cadence::Weekly => "WEEKLY",
            Cadence::Biweekly => "BIWEEKLY",
            Cadence::Semimonthly => "SEMIMONTHLY",
            Cadence::Monthly => "MONTHLY",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = PayPeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WEEKLY" => Ok(Cadence::Weekly),
            "BIWEEKLY" => Ok(Cadence::Biweekly),
            "SEMIMONTHLY" => Ok(Cadence::Semimonthly),
            "MONTHLY" => Ok(Cadence::Monthly),
            _ => Err(PayPeriodError::UnsupportedCadence(s.to_string())),
        }
    }
}

/// Cadence policy of an organization or location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayPeriodPolicy {
    pub cadence: Cadence,
    /// 0 = Sunday ..= 6 = Saturday.
    #[serde(default)]
    pub week_start_day: u8,
    /// Required for [`Cadence::Biweekly`], ignored otherwise.
    #[serde(default)]
    pub biweekly_anchor: Option<NaiveDate>,
}

impl PayPeriodPolicy {
    /// Build a policy from stored column values, failing fast on bad configuration.
    pub fn from_parts(
        cadence: &str,
        week_start_day: Option<i32>,
        biweekly_anchor: Option<NaiveDate>,
    ) -> Result<Self, PayPeriodError> {
        let cadence = cadence.parse::<Cadence>()?;
        let week_start_day = match week_start_day.unwrap_or(0) {
            day @ 0..=6 => day as u8,
            other => return Err(PayPeriodError::InvalidWeekStartDay(other)),
        };

        if cadence == Cadence::Biweekly && biweekly_anchor.is_none() {
            return Err(PayPeriodError::MissingAnchor);
        }

        Ok(Self {
            cadence,
            week_start_day,
            biweekly_anchor,
        })
    }

    pub fn weekly(week_start_day: u8) -> Self {
        Self {
            cadence: Cadence::Weekly,
            week_start_day,
            biweekly_anchor: None,
        }
    }

    pub fn biweekly(anchor: NaiveDate) -> Self {
        Self {
            cadence: Cadence::Biweekly,
            week_start_day: 0,
            biweekly_anchor: Some(anchor),
        }
    }

    pub fn semimonthly() -> Self {
        Self {
            cadence: Cadence::Semimonthly,
            week_start_day: 0,
            biweekly_anchor: None,
        }
    }

    pub fn monthly() -> Self {
        Self {
            cadence: Cadence::Monthly,
            week_start_day: 0,
            biweekly_anchor: None,
        }
    }
}

/// A computed pay period, `[start_date, end_date)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayPeriodRange {
    /// First day of the period (inclusive).
    pub start_date: NaiveDate,
    /// First day after the period (exclusive).
    pub end_date: NaiveDate,
}

impl PayPeriodRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date < self.end_date
    }

    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

/// Compute the pay period for `reference` under `policy`.
///
/// Weekly periods start on the most recent `week_start_day` at or before the
/// reference. Biweekly periods advance from the anchor in 14-day steps while
/// the running start is on or before the reference, so the returned start is
/// the first anchor-aligned boundary strictly after the reference date.
/// Semimonthly periods split at the 16th; monthly periods follow the calendar.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use common::pay_period::{PayPeriodPolicy, compute_pay_period};
///
/// let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
/// let range = compute_pay_period(&PayPeriodPolicy::weekly(1), monday).unwrap();
/// assert_eq!(range.start_date, monday);
/// assert_eq!(range.days(), 7);
/// ```
pub fn compute_pay_period(
    policy: &PayPeriodPolicy,
    reference: NaiveDate,
) -> Result<PayPeriodRange, PayPeriodError> {
    match policy.cadence {
        Cadence::Weekly => weekly(policy.week_start_day, reference),
        Cadence::Biweekly => {
            let anchor = policy.biweekly_anchor.ok_or(PayPeriodError::MissingAnchor)?;
            biweekly(anchor, reference)
        }
        Cadence::Semimonthly => semimonthly(reference),
        Cadence::Monthly => monthly(reference),
    }
}

/// Same as [`compute_pay_period`] for an instant, truncated to its UTC date.
pub fn compute_pay_period_at(
    policy: &PayPeriodPolicy,
    instant: DateTime<Utc>,
) -> Result<PayPeriodRange, PayPeriodError> {
    compute_pay_period(policy, instant.date_naive())
}

fn weekly(week_start_day: u8, reference: NaiveDate) -> Result<PayPeriodRange, PayPeriodError> {
    if week_start_day > 6 {
        return Err(PayPeriodError::InvalidWeekStartDay(i32::from(week_start_day)));
    }

    let ref_day = reference.weekday().num_days_from_sunday();
    let offset = (ref_day + 7 - u32::from(week_start_day)) % 7;

    let start_date = reference
        .checked_sub_days(Days::new(u64::from(offset)))
        .ok_or(PayPeriodError::OutOfRange(reference))?;
    let end_date = add_days(start_date, 7, reference)?;

    Ok(PayPeriodRange {
        start_date,
        end_date,
    })
}

fn biweekly(anchor: NaiveDate, reference: NaiveDate) -> Result<PayPeriodRange, PayPeriodError> {
    let mut start_date = anchor;

    if reference >= anchor {
        // Jump straight to the last boundary at or before the reference, then
        // take the one step the loop contract demands.
        let whole_steps = (reference - anchor).num_days() / 14;
        let skipped = u64::try_from(whole_steps * 14)
            .map_err(|_| PayPeriodError::OutOfRange(reference))?;
        start_date = add_days(anchor, skipped, reference)?;
    }
    while start_date <= reference {
        start_date = add_days(start_date, 14, reference)?;
    }

    let end_date = add_days(start_date, 14, reference)?;
    Ok(PayPeriodRange {
        start_date,
        end_date,
    })
}

fn semimonthly(reference: NaiveDate) -> Result<PayPeriodRange, PayPeriodError> {
    let out_of_range = || PayPeriodError::OutOfRange(reference);

    if reference.day() <= 15 {
        Ok(PayPeriodRange {
            start_date: reference.with_day(1).ok_or_else(out_of_range)?,
            end_date: reference.with_day(16).ok_or_else(out_of_range)?,
        })
    } else {
        Ok(PayPeriodRange {
            start_date: reference.with_day(16).ok_or_else(out_of_range)?,
            end_date: first_of_next_month(reference)?,
        })
    }
}

fn monthly(reference: NaiveDate) -> Result<PayPeriodRange, PayPeriodError> {
    Ok(PayPeriodRange {
        start_date: reference
            .with_day(1)
            .ok_or(PayPeriodError::OutOfRange(reference))?,
        end_date: first_of_next_month(reference)?,
    })
}

fn first_of_next_month(date: NaiveDate) -> Result<NaiveDate, PayPeriodError> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(PayPeriodError::OutOfRange(date))
}

fn add_days(date: NaiveDate, days: u64, reference: NaiveDate) -> Result<NaiveDate, PayPeriodError> {
    date.checked_add_days(Days::new(days))
        .ok_or(PayPeriodError::OutOfRange(reference))
}
