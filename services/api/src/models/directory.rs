//! Read-only organization directory entries referenced by punches

use chrono::NaiveDate;
use common::pay_period::{PayPeriodError, PayPeriodPolicy};
use serde::{Deserialize, Serialize};

/// Employee as seen by the timeclock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: i64,
    pub organization_id: i64,
    pub name: String,
}

/// Location with its cadence columns already resolved against its organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: i64,
    pub organization_id: i64,
    pub name: String,
    pub pay_cadence: String,
    pub week_start_day: Option<i32>,
    pub biweekly_anchor_date: Option<NaiveDate>,
}

impl Location {
    /// Cadence policy for this location, failing on misconfiguration.
    pub fn policy(&self) -> Result<PayPeriodPolicy, PayPeriodError> {
        PayPeriodPolicy::from_parts(
            &self.pay_cadence,
            self.week_start_day,
            self.biweekly_anchor_date,
        )
    }
}
