//! Legal age checks.

use chrono::{Datelike, NaiveDate};

/// Age of majority applied to every buyer.
pub const AGE_OF_MAJORITY: i32 = 18;

/// Whole years between `dob` and `today`.
///
/// The birthday itself counts: someone born on 2008-03-01 is 18 on 2026-03-01.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

/// Unknown date of birth is treated as under age.
pub fn is_of_legal_age(dob: Option<NaiveDate>, today: NaiveDate) -> bool {
    dob.map_or(false, |d| age_on(d, today) >= AGE_OF_MAJORITY)
}
