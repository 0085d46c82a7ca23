use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::Test;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum AccessDenied {
    #[error("test is not active")]
    Inactive,
    #[error("test has not started yet")]
    NotYetOpen,
    #[error("test has already closed")]
    Closed,
    #[error("attempt limit of {max_attempts} reached")]
    AttemptLimit { max_attempts: i32 },
}

/// Whether the test can be started right now: active flag plus the
/// scheduled window when one is set.
pub(crate) fn check_open(test: &Test, now: PrimitiveDateTime) -> Result<(), AccessDenied> {
    if !test.is_active {
        return Err(AccessDenied::Inactive);
    }
    if let Some(start) = test.scheduled_start {
        if now < start {
            return Err(AccessDenied::NotYetOpen);
        }
    }
    if let Some(end) = test.scheduled_end {
        if now >= end {
            return Err(AccessDenied::Closed);
        }
    }
    Ok(())
}

/// Attempt accounting is a pure count of finished submissions. Guests
/// carry no stable identity, so they are never attempt-limited.
pub(crate) fn check_attempts(
    test: &Test,
    prior_submissions: i64,
    is_guest: bool,
) -> Result<(), AccessDenied> {
    if is_guest {
        return Ok(());
    }
    if prior_submissions >= i64::from(test.max_attempts) {
        return Err(AccessDenied::AttemptLimit { max_attempts: test.max_attempts });
    }
    Ok(())
}

pub(crate) fn remaining_attempts(test: &Test, prior_submissions: i64) -> i64 {
    (i64::from(test.max_attempts) - prior_submissions).max(0)
}
