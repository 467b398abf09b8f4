//! Payroll period models

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a payroll period: OPEN -> APPROVED -> LOCKED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeriodStatus {
    Open,
    Approved,
    Locked,
}

impl PeriodStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PeriodStatus::Open => "OPEN",
            PeriodStatus::Approved => "APPROVED",
            PeriodStatus::Locked => "LOCKED",
        }
    }

    /// Approved and locked periods freeze punch edits.
    pub fn freezes_punches(self) -> bool {
        matches!(self, PeriodStatus::Approved | PeriodStatus::Locked)
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(PeriodStatus::Open),
            "APPROVED" => Ok(PeriodStatus::Approved),
            "LOCKED" => Ok(PeriodStatus::Locked),
            other => Err(format!("unknown period status: {}", other)),
        }
    }
}

/// Persisted payroll period, `[start_date, end_date)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollPeriod {
    pub id: i64,
    pub organization_id: i64,
    /// `None` means the period applies organization-wide.
    pub location_id: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: PeriodStatus,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PayrollPeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date < self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayrollPeriod {
    pub organization_id: i64,
    pub location_id: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Query for `POST /payperiod/generate`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuery {
    pub months_ahead: Option<u32>,
    pub months_back: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub created_count: u64,
}

/// Query for `GET /payperiod/current`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodQuery {
    pub location_id: i64,
    pub date: Option<NaiveDate>,
}

/// Query for `GET /payperiod/locked`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedQuery {
    pub location_id: Option<i64>,
    pub date: NaiveDate,
}
