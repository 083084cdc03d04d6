use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How many days into the future `CronExpr::next_after` will scan before
/// concluding that an expression has no future occurrence (e.g. "0 0 30 2 *").
const MAX_LOOKAHEAD_DAYS: usize = 4 * 366;

/// The repetition category of a `Schedule`. Named cadences like daily or
/// weekly are editor sugar and are normalized to a cron expression before
/// they reach the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "pattern", rename_all = "lowercase")]
pub enum Recurrence {
    Once,
    Cron {
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<Tz>,
    },
}

/// The outcome of asking "when does this schedule fire next?".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NextFire {
    /// Epoch millis of the next occurrence.
    At(i64),
    /// No future occurrence, the schedule should be deactivated.
    Terminal,
}

#[derive(Error, Debug, PartialEq)]
pub enum CronParseError {
    #[error("A cron expression must have 5 fields, got {0}")]
    FieldCount(usize),
    #[error("Malformed cron field: `{0}`")]
    Malformed(String),
    #[error("Cron field value {value} is outside the valid range {min}-{max}")]
    OutOfRange { value: u32, min: u32, max: u32 },
    #[error("Cron step must be greater than zero: `{0}`")]
    ZeroStep(String),
}

/// A parsed 5-field cron expression: minute, hour, day of month, month and
/// day of week (0 = Sunday). A candidate instant matches when all five
/// fields match.
#[derive(Debug, Clone, PartialEq)]
pub struct CronExpr {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
}

impl CronExpr {
    pub fn parse(expression: &str) -> Result<Self, CronParseError> {
        let fields = expression.split_whitespace().collect::<Vec<_>>();
        if fields.len() != 5 {
            return Err(CronParseError::FieldCount(fields.len()));
        }
        Ok(Self {
            minutes: parse_field(fields[0], 0, 59)?,
            hours: parse_field(fields[1], 0, 23)?,
            days_of_month: parse_field(fields[2], 1, 31)?,
            months: parse_field(fields[3], 1, 12)?,
            days_of_week: parse_field(fields[4], 0, 6)?,
        })
    }

    /// The earliest instant strictly after `from_millis` matching this
    /// expression in `tz`. The search is bounded, an expression that never
    /// matches yields `Terminal` instead of looping.
    pub fn next_after(&self, from_millis: i64, tz: Tz) -> NextFire {
        let from = match Utc.timestamp_millis_opt(from_millis).single() {
            Some(instant) => instant.with_timezone(&tz),
            None => return NextFire::Terminal,
        };

        let mut date = from.date_naive();
        for _ in 0..MAX_LOOKAHEAD_DAYS {
            if self.matches_date(date) {
                if let Some(at) = self.first_match_within_day(date, tz, from_millis) {
                    return NextFire::At(at);
                }
            }
            date = match date.succ_opt() {
                Some(next) => next,
                None => return NextFire::Terminal,
            };
        }
        NextFire::Terminal
    }

    fn matches_date(&self, date: NaiveDate) -> bool {
        self.months.contains(&date.month())
            && self.days_of_month.contains(&date.day())
            && self
                .days_of_week
                .contains(&date.weekday().num_days_from_sunday())
    }

    fn first_match_within_day(&self, date: NaiveDate, tz: Tz, after_millis: i64) -> Option<i64> {
        for &hour in &self.hours {
            for &minute in &self.minutes {
                let local = date.and_hms_opt(hour, minute, 0)?;
                let instant = match tz.from_local_datetime(&local) {
                    chrono::LocalResult::Single(instant) => instant,
                    // A clock rolled back by DST maps to two instants, fire on the first
                    chrono::LocalResult::Ambiguous(earliest, _) => earliest,
                    // A local time skipped by a DST gap is not an occurrence
                    chrono::LocalResult::None => continue,
                };
                let ts = instant.timestamp_millis();
                if ts > after_millis {
                    return Some(ts);
                }
            }
        }
        None
    }
}

/// Computes the instant of the firing after `from_millis`, or `Terminal`
/// when the schedule has run its course. One-time schedules never have a
/// next fire. Cron schedules are evaluated in their configured timezone,
/// defaulting to UTC.
pub fn compute_next(recurrence: &Recurrence, from_millis: i64) -> Result<NextFire, CronParseError> {
    match recurrence {
        Recurrence::Once => Ok(NextFire::Terminal),
        Recurrence::Cron {
            expression,
            timezone,
        } => {
            let expr = CronExpr::parse(expression)?;
            let tz = (*timezone).unwrap_or(chrono_tz::UTC);
            Ok(expr.next_after(from_millis, tz))
        }
    }
}

fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>, CronParseError> {
    if field == "*" {
        return Ok((min..=max).collect());
    }
    if let Some(step) = field.strip_prefix("*/") {
        let step = step
            .parse::<u32>()
            .map_err(|_| CronParseError::Malformed(field.to_string()))?;
        if step == 0 {
            return Err(CronParseError::ZeroStep(field.to_string()));
        }
        return Ok((min..=max).step_by(step as usize).collect());
    }
    if field.contains(',') {
        let mut values = field
            .split(',')
            .map(|part| parse_value(part, min, max))
            .collect::<Result<Vec<_>, _>>()?;
        values.sort_unstable();
        values.dedup();
        return Ok(values);
    }
    if let Some((start, rest)) = field.split_once('-') {
        let (end, step) = match rest.split_once('/') {
            Some((end, step)) => {
                let step = step
                    .parse::<u32>()
                    .map_err(|_| CronParseError::Malformed(field.to_string()))?;
                if step == 0 {
                    return Err(CronParseError::ZeroStep(field.to_string()));
                }
                (end, step)
            }
            None => (rest, 1),
        };
        let start = parse_value(start, min, max)?;
        let end = parse_value(end, min, max)?;
        if start > end {
            return Err(CronParseError::Malformed(field.to_string()));
        }
        return Ok((start..=end).step_by(step as usize).collect());
    }
    Ok(vec![parse_value(field, min, max)?])
}

fn parse_value(value: &str, min: u32, max: u32) -> Result<u32, CronParseError> {
    let n = value
        .parse::<u32>()
        .map_err(|_| CronParseError::Malformed(value.to_string()))?;
    if n < min || n > max {
        return Err(CronParseError::OutOfRange { value: n, min, max });
    }
    Ok(n)
}
