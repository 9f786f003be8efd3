//! Clock helpers shared by the catalog modules.

use time::{Date, OffsetDateTime};

/// Today's calendar date in UTC.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

pub fn current_year() -> i32 {
    today().year()
}
