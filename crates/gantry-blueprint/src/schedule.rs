//! Declarative cron schedules.
//!
//! Schedules only describe *when* something should run; nothing in the
//! local runtime executes them. They exist so synthesized manifests carry
//! the same scheduling intent the provisioned system does (snapshot
//! schedules, backup windows).

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A daily cron schedule with minute and hour fields.
///
/// Rendered as a five-field cron expression in which the day-of-month,
/// month, and day-of-week fields are always `*`.
///
/// # Example
///
/// ```rust
/// use gantry_blueprint::schedule::CronSchedule;
///
/// let schedule = CronSchedule::daily_at(9, 0).unwrap();
/// assert_eq!(schedule.expression(), "0 9 * * *");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CronSchedule {
    minute: u8,
    hour: u8,
}

impl CronSchedule {
    /// Daily at 09:00 UTC, the default search snapshot schedule.
    pub const DAILY_SNAPSHOT: Self = Self { minute: 0, hour: 9 };

    /// Daily at 02:00 UTC, the default backup window start.
    pub const DAILY_BACKUP: Self = Self { minute: 0, hour: 2 };

    /// Creates a schedule that fires once a day at the given UTC time.
    ///
    /// # Errors
    ///
    /// Returns an error if `hour` is not below 24 or `minute` is not
    /// below 60.
    pub fn daily_at(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 {
            return Err(Error::invalid_spec(
                "schedule",
                format!("{hour:02}:{minute:02}"),
                "hour must be in 0..=23",
            ));
        }
        if minute > 59 {
            return Err(Error::invalid_spec(
                "schedule",
                format!("{hour:02}:{minute:02}"),
                "minute must be in 0..=59",
            ));
        }
        Ok(Self { minute, hour })
    }

    /// Returns the minute field.
    #[must_use]
    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Returns the hour field.
    #[must_use]
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Renders the five-field cron expression.
    #[must_use]
    pub fn expression(&self) -> String {
        format!("{} {} * * *", self.minute, self.hour)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression())
    }
}

impl FromStr for CronSchedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(Error::invalid_spec(
                "schedule",
                s,
                "expected a five-field cron expression",
            ));
        }
        if fields[2..] != ["*", "*", "*"] {
            return Err(Error::invalid_spec(
                "schedule",
                s,
                "only daily schedules are supported (day, month, and weekday fields must be '*')",
            ));
        }
        let minute: u8 = fields[0]
            .parse()
            .map_err(|_| Error::invalid_spec("schedule", s, "minute field is not a number"))?;
        let hour: u8 = fields[1]
            .parse()
            .map_err(|_| Error::invalid_spec("schedule", s, "hour field is not a number"))?;
        Self::daily_at(hour, minute)
    }
}

impl Serialize for CronSchedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CronSchedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_at_renders_five_fields() -> Result<()> {
        let schedule = CronSchedule::daily_at(2, 0)?;
        assert_eq!(schedule.expression(), "0 2 * * *");
        assert_eq!(schedule.to_string(), "0 2 * * *");
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(CronSchedule::daily_at(24, 0).is_err());
        assert!(CronSchedule::daily_at(9, 60).is_err());
    }

    #[test]
    fn parses_expression() -> Result<()> {
        let schedule: CronSchedule = "0 9 * * *".parse()?;
        assert_eq!(schedule, CronSchedule::DAILY_SNAPSHOT);
        Ok(())
    }

    #[test]
    fn rejects_non_daily_expressions() {
        assert!("0 9 1 * *".parse::<CronSchedule>().is_err());
        assert!("0 9 * * mon".parse::<CronSchedule>().is_err());
        assert!("0 9 * *".parse::<CronSchedule>().is_err());
    }

    #[test]
    fn serializes_as_expression_string() {
        let json = serde_json::to_string(&CronSchedule::DAILY_BACKUP).unwrap();
        assert_eq!(json, "\"0 2 * * *\"");
        let back: CronSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CronSchedule::DAILY_BACKUP);
    }
}
