//! Human-friendly predicate arguments
//!
//! Turns `--user`, `--group`, `--mtime` and `--size` style arguments into a
//! numeric [`Predicate`].

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use nix::unistd::{Group, User};

use crate::query::Predicate;
use crate::size::parse_size;
use crate::{DusqlError, Result};

const MINUTE: f64 = 60.0;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;

/// Parse a modification-time argument into seconds since the epoch
///
/// Accepts a year (`2018`), a date (`20170602`, `2017-06-02`), an RFC 3339
/// timestamp, or an age before `now` such as `1y6m`, `2w`, `36h` or `90min`
/// (y = 365 days, m = 30 days). A leading `-` negates the result, which the
/// predicate reads as "older than"; a leading `+` is ignored.
pub fn parse_mtime(arg: &str, now: DateTime<Utc>) -> Result<f64> {
    let trimmed = arg.trim();
    let (negate, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let time = parse_instant(body)
        .or_else(|| parse_age(body).map(|age| now.timestamp_millis() as f64 / 1000.0 - age))
        .ok_or_else(|| DusqlError::InvalidUnit {
            kind: "mtime",
            value: arg.to_string(),
        })?;

    Ok(if negate { -time } else { time })
}

/// Absolute date forms, as UTC seconds
fn parse_instant(body: &str) -> Option<f64> {
    let all_digits = !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit());

    let date = if all_digits && body.len() == 4 {
        NaiveDate::from_ymd_opt(body.parse().ok()?, 1, 1)
    } else if all_digits && body.len() == 8 {
        NaiveDate::parse_from_str(body, "%Y%m%d").ok()
    } else if let Ok(date) = NaiveDate::parse_from_str(body, "%Y-%m-%d") {
        Some(date)
    } else if let Ok(stamp) = DateTime::parse_from_rfc3339(body) {
        return Some(stamp.timestamp_millis() as f64 / 1000.0);
    } else {
        None
    }?;

    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    Some(midnight.timestamp() as f64)
}

/// Ages like `1y6m` or `2d12h`, in seconds
fn parse_age(body: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut rest = body;
    if rest.is_empty() {
        return None;
    }

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let unit_len = rest[number_len..]
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len() - number_len);

        let number: f64 = rest[..number_len].parse().ok()?;
        let unit = match &rest[number_len..number_len + unit_len] {
            "y" | "yr" | "year" | "years" => 365.0 * DAY,
            "m" | "mo" | "month" | "months" => 30.0 * DAY,
            "w" | "week" | "weeks" => 7.0 * DAY,
            "d" | "day" | "days" => DAY,
            "h" | "hr" | "hour" | "hours" => HOUR,
            "min" | "mins" | "minute" | "minutes" => MINUTE,
            "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
            _ => return None,
        };

        total += number * unit;
        rest = &rest[number_len + unit_len..];
    }

    Some(total)
}

/// Resolve a user name or numeric uid
pub fn resolve_user(name: &str) -> Result<u32> {
    if let Ok(uid) = name.parse() {
        return Ok(uid);
    }
    User::from_name(name)
        .map_err(|e| DusqlError::Io(e.into()))?
        .map(|user| user.uid.as_raw())
        .ok_or_else(|| DusqlError::UnknownUser(name.to_string()))
}

/// Resolve a group name or numeric gid
pub fn resolve_group(name: &str) -> Result<u32> {
    if let Ok(gid) = name.parse() {
        return Ok(gid);
    }
    Group::from_name(name)
        .map_err(|e| DusqlError::Io(e.into()))?
        .map(|group| group.gid.as_raw())
        .ok_or_else(|| DusqlError::UnknownGroup(name.to_string()))
}

/// `!name` or `-name` selects the negated clause
fn split_negation(arg: &str) -> (bool, &str) {
    match arg.strip_prefix('!').or_else(|| arg.strip_prefix('-')) {
        Some(name) => (true, name),
        None => (false, arg),
    }
}

/// Predicate arguments as typed by a user
#[derive(Debug, Clone, Default)]
pub struct HumanPredicate {
    pub group: Option<String>,
    pub user: Option<String>,
    pub mtime: Option<String>,
    pub size: Option<String>,
}

impl HumanPredicate {
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<Predicate> {
        let mut predicate = Predicate::any();

        if let Some(group) = &self.group {
            let (negated, name) = split_negation(group);
            let gid = resolve_group(name)?;
            if negated {
                predicate.not_gid = Some(gid);
            } else {
                predicate.gid = Some(gid);
            }
        }

        if let Some(user) = &self.user {
            let (negated, name) = split_negation(user);
            let uid = resolve_user(name)?;
            if negated {
                predicate.not_uid = Some(uid);
            } else {
                predicate.uid = Some(uid);
            }
        }

        if let Some(mtime) = &self.mtime {
            predicate.mtime = Some(parse_mtime(mtime, now)?);
        }

        if let Some(size) = &self.size {
            predicate.size = Some(parse_size(size)?);
        }

        Ok(predicate)
    }
}
