//! Relative period offsets such as `+1d`, `-2h30m` or `+1w at 13:30`.
//!
//! An offset is one or more signed parts. A part is a sequence of `<number><unit>` pairs where
//! the unit is one of `y M w d h m s S` (years, months, weeks, days, hours, minutes, seconds,
//! millis), optionally followed by more lowercase letters (`+2days`). A number without a unit
//! counts days. `at HH:MM[:SS]` adds a time of day.

use chrono::{Duration, Months, NaiveDateTime, NaiveTime, Timelike};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid period, expected something like +1d or -2h30m")]
pub struct PeriodError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeriodOffset {
    months: i64,
    days: i64,
    duration: Duration,
}

impl PeriodOffset {
    pub fn parse(expression: &str) -> Result<Self, PeriodError> {
        let error = || PeriodError(expression.to_string());

        let (period, time) = split_time_of_day(expression);
        let compact: String = period.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() && time.is_none() {
            return Err(error());
        }
        if !compact.is_empty() && !compact.starts_with(['+', '-']) {
            return Err(error());
        }

        let mut offset = PeriodOffset::default();
        let mut chars = compact.chars().peekable();
        let mut sign = 1i64;

        while let Some(c) = chars.next() {
            match c {
                '+' => sign = 1,
                '-' => sign = -1,
                digit if digit.is_ascii_digit() => {
                    let mut number = String::from(digit);
                    while let Some(next) = chars.peek().copied().filter(char::is_ascii_digit) {
                        number.push(next);
                        chars.next();
                    }
                    let amount = number.parse::<i64>().map_err(|_| error())? * sign;
                    let unit = match chars.peek().copied() {
                        Some(unit) if unit.is_ascii_alphabetic() => {
                            chars.next();
                            // trailing letters of a spelled out unit, e.g. "days"
                            while chars.peek().is_some_and(char::is_ascii_lowercase) {
                                chars.next();
                            }
                            unit
                        }
                        _ => 'd',
                    };
                    offset.add(unit, amount).ok_or_else(error)?;
                }
                _ => return Err(error()),
            }
        }

        if let Some(time) = time {
            let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
                .map_err(|_| error())?;
            let since_midnight = Duration::try_seconds(i64::from(time.num_seconds_from_midnight()))
                .ok_or_else(error)?;
            offset.duration = offset
                .duration
                .checked_add(&since_midnight)
                .ok_or_else(error)?;
        }

        Ok(offset)
    }

    fn add(&mut self, unit: char, amount: i64) -> Option<()> {
        let duration = match unit {
            'y' | 'Y' => {
                self.months = self.months.checked_add(amount.checked_mul(12)?)?;
                return Some(());
            }
            'M' => {
                self.months = self.months.checked_add(amount)?;
                return Some(());
            }
            'w' | 'W' => {
                self.days = self.days.checked_add(amount.checked_mul(7)?)?;
                return Some(());
            }
            'd' | 'D' => {
                self.days = self.days.checked_add(amount)?;
                return Some(());
            }
            'h' | 'H' => Duration::try_hours(amount)?,
            'm' => Duration::try_minutes(amount)?,
            's' => Duration::try_seconds(amount)?,
            'S' => Duration::try_milliseconds(amount)?,
            _ => return None,
        };
        self.duration = self.duration.checked_add(&duration)?;
        Some(())
    }

    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.days == 0 && self.duration.is_zero()
    }

    /// `None` when the result falls outside the supported date range.
    pub fn apply(&self, date_time: NaiveDateTime) -> Option<NaiveDateTime> {
        let months = Months::new(u32::try_from(self.months.unsigned_abs()).ok()?);
        let shifted = if self.months >= 0 {
            date_time.checked_add_months(months)?
        } else {
            date_time.checked_sub_months(months)?
        };
        shifted
            .checked_add_signed(Duration::try_days(self.days)?)?
            .checked_add_signed(self.duration)
    }
}

impl FromStr for PeriodOffset {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PeriodOffset::parse(s)
    }
}

/// Splits off a trailing `at HH:MM` clause.
fn split_time_of_day(expression: &str) -> (&str, Option<&str>) {
    let trimmed = expression.trim();
    if let Some(time) = trimmed.strip_prefix("at ") {
        return ("", Some(time.trim()));
    }
    match trimmed.find(" at ") {
        Some(index) => (&trimmed[..index], Some(trimmed[index + 4..].trim())),
        None => (trimmed, None),
    }
}
