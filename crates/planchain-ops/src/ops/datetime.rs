//! Date and time operations on ISO-8601 style timestamps

use crate::params::{optional_str, require, require_str};
use crate::registry::Operation;
use chrono::format::{Item, StrftimeItems};
use chrono::{
    DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeDelta, TimeZone,
    Timelike, Utc,
};
use planchain_core::{OperationOutput, OperationSchema, ParamDef, ParamType, Params, Result};
use serde_json::{json, Value};
use std::fmt::Write;

const CATEGORY: &str = "datetime_operations";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

/// A parsed timestamp. Inputs without an offset stay naive and compare as UTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stamp {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl Stamp {
    /// RFC 3339 first, then common naive date-time and date layouts.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Self::Aware(dt));
        }
        for fmt in NAIVE_DATETIME_FORMATS {
            if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Self::Naive(n));
            }
        }
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Self::Naive)
    }

    /// Parse with an explicit strftime layout, with or without an offset.
    pub fn parse_with(s: &str, fmt: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(Self::Aware(dt));
        }
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Self::Naive(n));
        }
        NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Self::Naive)
    }

    /// Wall-clock time as written.
    fn local(&self) -> NaiveDateTime {
        match self {
            Self::Aware(dt) => dt.naive_local(),
            Self::Naive(n) => *n,
        }
    }

    fn utc(&self) -> NaiveDateTime {
        match self {
            Self::Aware(dt) => dt.naive_utc(),
            Self::Naive(n) => *n,
        }
    }

    pub fn checked_add(&self, delta: TimeDelta) -> Option<Self> {
        match self {
            Self::Aware(dt) => dt.checked_add_signed(delta).map(Self::Aware),
            Self::Naive(n) => n.checked_add_signed(delta).map(Self::Naive),
        }
    }

    pub fn iso(&self) -> String {
        match self {
            Self::Aware(dt) => dt.to_rfc3339(),
            Self::Naive(n) => n.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }

    fn timestamp(&self) -> f64 {
        let utc = Utc.from_utc_datetime(&self.utc());
        utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_millis()) / 1000.0
    }

    /// `None` when the layout is not a valid strftime string.
    pub fn format(&self, fmt: &str) -> Option<String> {
        if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
            return None;
        }
        let mut out = String::new();
        let written = match self {
            Self::Aware(dt) => write!(out, "{}", dt.format(fmt)),
            Self::Naive(n) => write!(out, "{}", n.format(fmt)),
        };
        written.ok().map(|_| out)
    }

    pub fn components(&self) -> Value {
        let n = self.local();
        json!({
            "timestamp": self.timestamp(),
            "iso_format": self.iso(),
            "year": n.year(),
            "month": n.month(),
            "day": n.day(),
            "hour": n.hour(),
            "minute": n.minute(),
            "second": n.second(),
            "weekday": n.format("%A").to_string(),
            "month_name": n.format("%B").to_string(),
        })
    }
}

/// `days`, `hours`, `minutes`, `seconds`, or `weeks`.
fn delta(amount: i64, unit: &str) -> std::result::Result<TimeDelta, String> {
    let d = match unit {
        "days" => TimeDelta::try_days(amount),
        "hours" => TimeDelta::try_hours(amount),
        "minutes" => TimeDelta::try_minutes(amount),
        "seconds" => TimeDelta::try_seconds(amount),
        "weeks" => TimeDelta::try_weeks(amount),
        other => return Err(format!("Unsupported unit: {}", other)),
    };
    d.ok_or_else(|| format!("{} {} is out of range", amount, unit))
}

fn unparseable(field: &str, value: &str) -> OperationOutput {
    OperationOutput::failure(format!("Could not parse {} '{}'", field, value))
}

pub struct GetCurrentTime {
    schema: OperationSchema,
}

impl GetCurrentTime {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new("get_current_time", CATEGORY, "Get current date and time")
                .param(ParamDef::optional(
                    "timezone_name",
                    ParamType::String,
                    "UTC or local",
                    "local",
                ))
                .param(ParamDef::optional(
                    "format_string",
                    ParamType::String,
                    "strftime layout for an extra 'formatted' field",
                    Value::Null,
                ))
                .returns("datetime: timestamp, iso_format, year .. second, weekday, month_name"),
        }
    }
}

impl Default for GetCurrentTime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for GetCurrentTime {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let zone = optional_str(&params, "timezone_name").unwrap_or("local");
        let now: DateTime<FixedOffset> = match zone.to_lowercase().as_str() {
            "utc" => Utc::now().into(),
            "local" => Local::now().into(),
            _ => {
                return Ok(OperationOutput::failure(format!(
                    "Unsupported timezone: {} (use UTC or local)",
                    zone
                )))
            }
        };
        let stamp = Stamp::Aware(now);
        let mut info = stamp.components();
        if let Some(fmt) = optional_str(&params, "format_string") {
            match stamp.format(fmt) {
                Some(s) => info["formatted"] = Value::String(s),
                None => {
                    return Ok(OperationOutput::failure(format!(
                        "Invalid format string: {}",
                        fmt
                    )))
                }
            }
        }
        Ok(OperationOutput::data(info.clone()).with("datetime", info))
    }
}

pub struct ParseDatetime {
    schema: OperationSchema,
}

impl ParseDatetime {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "parse_datetime",
                CATEGORY,
                "Parse a datetime string into components",
            )
            .param(ParamDef::required("datetime_string", ParamType::String, "Text to parse"))
            .param(ParamDef::optional(
                "format_string",
                ParamType::String,
                "strftime layout; common layouts are tried when omitted",
                Value::Null,
            ))
            .returns("datetime: timestamp, iso_format, year .. second, weekday, month_name"),
        }
    }
}

impl Default for ParseDatetime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for ParseDatetime {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let text = require_str("parse_datetime", &params, "datetime_string")?;
        let parsed = match optional_str(&params, "format_string") {
            Some(fmt) => Stamp::parse_with(text, fmt),
            None => Stamp::parse(text),
        };
        match parsed {
            Some(stamp) => {
                let info = stamp.components();
                Ok(OperationOutput::data(info.clone()).with("datetime", info))
            }
            None => Ok(unparseable("datetime_string", text)),
        }
    }
}

pub struct AddTime {
    schema: OperationSchema,
}

impl AddTime {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new("add_time", CATEGORY, "Add an amount of time to a date")
                .param(ParamDef::required("base_date", ParamType::String, "ISO date or date-time"))
                .param(ParamDef::required(
                    "amount",
                    ParamType::Integer,
                    "Amount to add; negative subtracts",
                ))
                .param(ParamDef::required(
                    "unit",
                    ParamType::String,
                    "days, hours, minutes, seconds, or weeks",
                ))
                .returns("new_date, formatted")
                .example("add_time('2024-01-31', 1, 'days')"),
        }
    }
}

impl Default for AddTime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for AddTime {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let base = require_str("add_time", &params, "base_date")?;
        let amount = require("add_time", &params, "amount")?;
        let amount = match amount
            .as_i64()
            .or_else(|| amount.as_str().and_then(|s| s.trim().parse().ok()))
        {
            Some(a) => a,
            None => {
                return Err(planchain_core::Error::invalid_parameter(
                    "add_time",
                    "amount",
                    "expected an integer",
                ))
            }
        };
        let unit = require_str("add_time", &params, "unit")?;

        let Some(stamp) = Stamp::parse(base) else {
            return Ok(unparseable("base_date", base));
        };
        let step = match delta(amount, unit) {
            Ok(d) => d,
            Err(e) => return Ok(OperationOutput::failure(e)),
        };
        let Some(shifted) = stamp.checked_add(step) else {
            return Ok(OperationOutput::failure(format!(
                "{} plus {} {} is out of range",
                base, amount, unit
            )));
        };

        let new_date = shifted.iso();
        Ok(OperationOutput::data(new_date.clone())
            .with("original_date", base)
            .with("amount_added", amount)
            .with("unit", unit)
            .with("new_date", new_date)
            .with(
                "formatted",
                shifted.local().format("%Y-%m-%d %H:%M:%S").to_string(),
            ))
    }
}

pub struct CalculateDateDifference {
    schema: OperationSchema,
}

impl CalculateDateDifference {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "calculate_date_difference",
                CATEGORY,
                "Calculate the difference between two dates",
            )
            .param(ParamDef::required("start_date", ParamType::String, "ISO date or date-time"))
            .param(ParamDef::required("end_date", ParamType::String, "ISO date or date-time"))
            .param(ParamDef::optional(
                "unit",
                ParamType::String,
                "days, hours, minutes, seconds, or weeks",
                "days",
            ))
            .returns("difference (end - start) in unit, total_seconds"),
        }
    }
}

impl Default for CalculateDateDifference {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for CalculateDateDifference {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let start = require_str("calculate_date_difference", &params, "start_date")?;
        let end = require_str("calculate_date_difference", &params, "end_date")?;
        let unit = optional_str(&params, "unit").unwrap_or("days");

        let Some(from) = Stamp::parse(start) else {
            return Ok(unparseable("start_date", start));
        };
        let Some(to) = Stamp::parse(end) else {
            return Ok(unparseable("end_date", end));
        };

        let diff = to.utc() - from.utc();
        let seconds = diff.num_milliseconds() as f64 / 1000.0;
        // Whole days truncate toward zero; the other units are fractional.
        let difference = match unit {
            "days" => json!(diff.num_days()),
            "hours" => json!(seconds / 3600.0),
            "minutes" => json!(seconds / 60.0),
            "seconds" => json!(seconds),
            "weeks" => json!(diff.num_days() as f64 / 7.0),
            other => return Ok(OperationOutput::failure(format!("Unsupported unit: {}", other))),
        };

        Ok(OperationOutput::data(difference.clone())
            .with("start_date", start)
            .with("end_date", end)
            .with("difference", difference)
            .with("unit", unit)
            .with("total_seconds", seconds))
    }
}
