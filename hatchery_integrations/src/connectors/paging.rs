//! Settings shared by the polling providers.

use hatchery_core::{Error, Result};
use std::time::Duration;

pub(crate) fn default_limit() -> u32 {
    100
}

pub(crate) fn default_duration() -> Duration {
    Duration::from_secs(10 * 60)
}

pub(crate) fn validate(limit: u32, duration: Duration, max_pages: Option<u64>) -> Result<()> {
    if limit == 0 {
        return Err(Error::InvalidInput("limit must be at least 1".to_string()));
    }
    if duration.is_zero() {
        return Err(Error::InvalidInput("duration must be positive".to_string()));
    }
    if max_pages == Some(0) {
        return Err(Error::InvalidInput("max_pages must be at least 1".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_paging() {
        assert!(validate(100, default_duration(), None).is_ok());
        assert!(validate(0, default_duration(), None).is_err());
        assert!(validate(1, Duration::ZERO, None).is_err());
        assert!(validate(1, default_duration(), Some(0)).is_err());
    }
}
