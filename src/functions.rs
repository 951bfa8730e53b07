//! Built-in date functions: `now()`, `today()`, `startOfWeek()`, `offset(now(), '+1h')`, ...
//!
//! Every function takes optional period arguments (see [`crate::period`]) that are applied in
//! order, e.g. `today('+1d', 'at 13:30')`. Results convert to the requested target: dates,
//! date-times or epoch milliseconds for integer properties.

use crate::ast::EqType;
use crate::converter::{ConversionError, FunctionHandler, TypeConverter};
use crate::error::EqlError;
use crate::period::PeriodOffset;
use crate::value::{PropertyType, Value};
use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc, Weekday};

const NOW: &str = "now";
const TODAY: &str = "today";
const TOMORROW: &str = "tomorrow";
const YESTERDAY: &str = "yesterday";
const START_OF_DAY: &str = "startOfDay";
const START_OF_WEEK: &str = "startOfWeek";
const START_OF_MONTH: &str = "startOfMonth";
const START_OF_YEAR: &str = "startOfYear";
const END_OF_DAY: &str = "endOfDay";
const END_OF_WEEK: &str = "endOfWeek";
const END_OF_MONTH: &str = "endOfMonth";
const END_OF_YEAR: &str = "endOfYear";
const OFFSET: &str = "offset";

const FUNCTIONS: &[&str] = &[
    NOW,
    TODAY,
    TOMORROW,
    YESTERDAY,
    START_OF_DAY,
    START_OF_WEEK,
    START_OF_MONTH,
    START_OF_YEAR,
    END_OF_DAY,
    END_OF_WEEK,
    END_OF_MONTH,
    END_OF_YEAR,
    OFFSET,
];

#[derive(Debug, Clone)]
pub struct DateFunctions {
    week_start: Weekday,
    zone: FixedOffset,
    /// Fixed local time instead of the system clock.
    clock: Option<NaiveDateTime>,
}

impl Default for DateFunctions {
    fn default() -> Self {
        Self {
            week_start: Weekday::Mon,
            zone: Utc.fix(),
            clock: None,
        }
    }
}

impl DateFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_week_start(self, week_start: Weekday) -> Self {
        Self { week_start, ..self }
    }

    /// Zone used for the current time and for epoch millisecond results.
    pub fn with_zone(self, zone: FixedOffset) -> Self {
        Self { zone, ..self }
    }

    pub fn with_clock(self, now: NaiveDateTime) -> Self {
        Self {
            clock: Some(now),
            ..self
        }
    }

    fn now(&self) -> NaiveDateTime {
        self.clock
            .unwrap_or_else(|| Utc::now().with_timezone(&self.zone).naive_local())
    }

    /// `None` when the result falls outside the supported date range.
    fn calculate(&self, name: &str) -> Option<NaiveDateTime> {
        let now = self.now();
        let today = now.date();
        let one_day = Duration::days(1);
        match name {
            TODAY | START_OF_DAY => Some(start_of(today)),
            TOMORROW => today.checked_add_signed(one_day).map(start_of),
            YESTERDAY => today.checked_sub_signed(one_day).map(start_of),
            START_OF_WEEK => self.first_day_of_week(today).map(start_of),
            START_OF_MONTH => Some(start_of(today.with_day(1).unwrap_or(today))),
            START_OF_YEAR => Some(start_of(today.with_ordinal(1).unwrap_or(today))),
            END_OF_DAY => Some(end_of(today)),
            END_OF_WEEK => self
                .first_day_of_week(today)
                .and_then(|first| first.checked_add_signed(Duration::days(6)))
                .map(end_of),
            END_OF_MONTH => Some(end_of(last_day_of_month(today))),
            END_OF_YEAR => Some(end_of(
                NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today),
            )),
            _ => Some(now),
        }
    }

    fn first_day_of_week(&self, date: NaiveDate) -> Option<NaiveDate> {
        let days_back = (7 + date.weekday().num_days_from_monday()
            - self.week_start.num_days_from_monday())
            % 7;
        date.checked_sub_signed(Duration::days(i64::from(days_back)))
    }

    fn to_target(&self, date_time: NaiveDateTime, target: &PropertyType) -> Result<Value, EqlError> {
        match target {
            PropertyType::Date => Ok(Value::Date(date_time.date())),
            PropertyType::Integer => {
                let utc = date_time
                    .checked_sub_signed(Duration::seconds(i64::from(self.zone.local_minus_utc())))
                    .ok_or_else(|| out_of_range(&date_time.to_string(), target))?;
                Ok(Value::Integer(utc.and_utc().timestamp_millis()))
            }
            _ => Ok(Value::DateTime(date_time)),
        }
    }
}

fn out_of_range(value: &str, target: &PropertyType) -> EqlError {
    ConversionError::new(value, target, "date out of range").into()
}

fn start_of(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn end_of(date: NaiveDate) -> NaiveDateTime {
    let last = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN);
    date.and_time(last)
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}

impl FunctionHandler for DateFunctions {
    fn accepts(&self, name: &str, target: &PropertyType) -> bool {
        FUNCTIONS.contains(&name)
            && matches!(
                target,
                PropertyType::Date | PropertyType::DateTime | PropertyType::Integer
            )
    }

    fn apply(
        &self,
        name: &str,
        arguments: &[EqType],
        target: &PropertyType,
        converter: &TypeConverter,
    ) -> Result<Value, EqlError> {
        let (mut calculated, modifiers) = if name == OFFSET {
            let Some((base, modifiers)) = arguments.split_first() else {
                return Err(ConversionError::new("offset()", target, "missing date argument").into());
            };
            let base = match converter.convert(&PropertyType::DateTime, base)? {
                Value::DateTime(date_time) => date_time,
                Value::Date(date) => start_of(date),
                other => {
                    return Err(ConversionError::new(&other.to_string(), target, "not a date").into())
                }
            };
            (base, modifiers)
        } else {
            let calculated = self
                .calculate(name)
                .ok_or_else(|| out_of_range(&format!("{}()", name), target))?;
            (calculated, arguments)
        };

        for modifier in modifiers {
            let Some(text) = modifier.as_text() else {
                return Err(ConversionError::new(&modifier.to_string(), target, "expected a period").into());
            };
            let period = PeriodOffset::parse(text)
                .map_err(|e| ConversionError::new(text, target, e.to_string()))?;
            calculated = period
                .apply(calculated)
                .ok_or_else(|| out_of_range(text, target))?;
        }

        self.to_target(calculated, target)
    }
}
