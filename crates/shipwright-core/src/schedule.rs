//! Cron schedules supplied by deployment targets.

use crate::{DeploymentRequest, Error, Result};
use chrono::{DateTime, Utc};
use std::str::FromStr;

/// A parsed cron expression and the request to dispatch when it fires.
#[derive(Debug, Clone)]
pub struct ScheduleSpec {
    expression: String,
    schedule: cron::Schedule,
    request: DeploymentRequest,
}

impl ScheduleSpec {
    /// Parse `expression` (cron crate syntax, seconds field first).
    pub fn new(expression: impl Into<String>, request: DeploymentRequest) -> Result<Self> {
        let expression = expression.into();
        let schedule = cron::Schedule::from_str(&expression)
            .map_err(|e| Error::Schedule(format!("{}: {}", expression, e)))?;
        Ok(Self {
            expression,
            schedule,
            request,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn request(&self) -> &DeploymentRequest {
        &self.request
    }

    /// Next fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Trigger;
    use chrono::TimeZone;

    fn request() -> DeploymentRequest {
        DeploymentRequest::new("app", "main", "/srv/app-main", Trigger::Schedule)
    }

    #[test]
    fn test_next_after_daily() {
        let spec = ScheduleSpec::new("0 0 3 * * *", request()).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = spec.next_after(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 2, 3, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_expression() {
        let err = ScheduleSpec::new("every tuesday", request()).unwrap_err();
        assert!(matches!(err, Error::Schedule(_)));
    }
}
