//! Property tests for the pay period calculator
//!
//! These tests check the range invariants over arbitrary reference dates
//! instead of hand-picked calendar examples.

use chrono::{Datelike, Days, NaiveDate};
use common::pay_period::{PayPeriodPolicy, compute_pay_period};
use proptest::prelude::*;

fn any_date() -> impl Strategy<Value = NaiveDate> {
    // 2000-01-01 .. roughly 2060
    (0u64..22_000).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2000, 1, 1)
            .and_then(|d| d.checked_add_days(Days::new(offset)))
            .expect("offset stays inside the calendar")
    })
}

proptest! {
    #[test]
    fn weekly_range_contains_reference(reference in any_date(), week_start in 0u8..7) {
        let range = compute_pay_period(&PayPeriodPolicy::weekly(week_start), reference).unwrap();

        prop_assert!(range.start_date <= reference);
        prop_assert!(reference < range.end_date);
        prop_assert_eq!(range.start_date.weekday().num_days_from_sunday(), u32::from(week_start));
        prop_assert_eq!(range.days(), 7);
    }

    #[test]
    fn monthly_ranges_are_contiguous(reference in any_date()) {
        let policy = PayPeriodPolicy::monthly();
        let range = compute_pay_period(&policy, reference).unwrap();
        let next = compute_pay_period(&policy, range.end_date).unwrap();

        prop_assert!(range.contains(reference));
        prop_assert_eq!(range.start_date.day(), 1);
        prop_assert_eq!(next.start_date, range.end_date);
    }

    #[test]
    fn semimonthly_ranges_are_contiguous(reference in any_date()) {
        let policy = PayPeriodPolicy::semimonthly();
        let range = compute_pay_period(&policy, reference).unwrap();
        let next = compute_pay_period(&policy, range.end_date).unwrap();
        let previous_day = range.start_date.pred_opt().unwrap();
        let previous = compute_pay_period(&policy, previous_day).unwrap();

        prop_assert!(range.contains(reference));
        prop_assert_eq!(next.start_date, range.end_date);
        prop_assert_eq!(previous.end_date, range.start_date);
        prop_assert!(range.start_date.day() == 1 || range.start_date.day() == 16);
    }

    #[test]
    fn biweekly_start_is_first_boundary_after_reference(
        reference in any_date(),
        anchor in any_date(),
    ) {
        let range = compute_pay_period(&PayPeriodPolicy::biweekly(anchor), reference).unwrap();

        prop_assert_eq!((range.start_date - anchor).num_days() % 14, 0);
        prop_assert!(range.start_date >= anchor);
        prop_assert_eq!(range.days(), 14);
        if reference >= anchor {
            prop_assert!(range.start_date > reference);
            prop_assert!((range.start_date - reference).num_days() <= 14);
        } else {
            prop_assert_eq!(range.start_date, anchor);
        }
    }

    #[test]
    fn computation_is_deterministic(reference in any_date(), week_start in 0u8..7) {
        let policy = PayPeriodPolicy::weekly(week_start);
        prop_assert_eq!(
            compute_pay_period(&policy, reference),
            compute_pay_period(&policy, reference)
        );
    }
}
