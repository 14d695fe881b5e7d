//! Parse restriction durations out of free text
//!
//! Accepts sequences like `1h30m`, `2 d 4 h`, `10с` or `3 недели`: one or more
//! `<number>[space]<unit>` segments, units drawn from a fixed synonym table.
//! A year is 365 days; leap years are ignored.

use std::time::Duration;

use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, opt};
use nom::error::{Error, ErrorKind};
use nom::multi::many1;
use nom::{IResult, Parser};
use thiserror::Error;

use crate::core::config::DurationConfig;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Unit synonyms and the quantum each one stands for
const UNITS: &[(&[&str], Duration)] = &[
    (
        &["y", "year", "years", "г", "год", "лет"],
        Duration::from_secs(365 * DAY),
    ),
    (
        &["w", "week", "weeks", "н", "нд", "неделя", "недели", "недель"],
        Duration::from_secs(7 * DAY),
    ),
    (
        &["d", "day", "days", "д", "дн", "день", "дня", "дней"],
        Duration::from_secs(DAY),
    ),
    (
        &["h", "hour", "hours", "ч", "час", "часа", "часов"],
        Duration::from_secs(HOUR),
    ),
    (
        &["m", "minute", "minutes", "м", "мин", "минута", "минуты", "минут"],
        Duration::from_secs(MINUTE),
    ),
    (
        &["s", "second", "seconds", "с", "сек", "секунда", "секунды", "секунд"],
        Duration::from_secs(1),
    ),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("no duration given")]
    Empty,
    #[error("invalid duration format: {0}")]
    InvalidFormat(String),
    #[error("duration is too long")]
    TooLong,
}

/// A duration found at the start of some text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDuration {
    pub duration: Duration,
    /// The exact text the duration was parsed from, words separated by single spaces
    pub matched: String,
}

impl ParsedDuration {
    /// How many whitespace-separated tokens the match spans
    pub fn consumed_tokens(&self) -> usize {
        self.matched.split_whitespace().count()
    }
}

/// Longest unit alias at the start of `input`
fn unit(input: &str) -> IResult<&str, Duration> {
    UNITS
        .iter()
        .flat_map(|(aliases, quantum)| aliases.iter().map(move |alias| (*alias, *quantum)))
        .filter(|(alias, _)| input.starts_with(alias))
        .max_by_key(|(alias, _)| alias.len())
        .map(|(alias, quantum)| (&input[alias.len()..], quantum))
        .ok_or_else(|| nom::Err::Error(Error::new(input, ErrorKind::Tag)))
}

/// `<digits>[ ]<unit>[ ]`
fn segment(input: &str) -> IResult<&str, (&str, Duration)> {
    let (input, (count, _, quantum, _)) = (
        digit1::<&str, Error<&str>>,
        opt(char::<&str, Error<&str>>(' ')),
        unit,
        opt(char::<&str, Error<&str>>(' ')),
    )
        .parse(input)?;
    Ok((input, (count, quantum)))
}

/// Strictly parse `value` as a whole; no floor is applied
pub fn parse_duration(value: &str) -> Result<Duration, DurationError> {
    let (_, segments) = all_consuming(many1(segment))
        .parse(value)
        .map_err(|_| DurationError::InvalidFormat(value.to_string()))?;

    let mut total: u64 = 0;
    for (count, quantum) in segments {
        // digit1 only yields ASCII digits, so a failed parse means overflow
        let count: u64 = count.parse().map_err(|_| DurationError::TooLong)?;
        total = count
            .checked_mul(quantum.as_secs())
            .and_then(|secs| total.checked_add(secs))
            .ok_or(DurationError::TooLong)?;
    }

    Ok(Duration::from_secs(total))
}

/// Find the longest duration at the start of user-supplied text
///
/// The candidate grows one word at a time; every prefix that parses becomes
/// the new best match. Growth stops after `max_consecutive_failures`
/// non-parsing prefixes in a row. The result is raised to the configured
/// floor.
pub fn parse_duration_from_text(
    text: &str,
    config: &DurationConfig,
) -> Result<ParsedDuration, DurationError> {
    let mut words = text.split_whitespace().peekable();
    if words.peek().is_none() {
        return Err(DurationError::Empty);
    }

    let mut candidate = String::new();
    let mut best: Option<(Duration, String)> = None;
    let mut failures = 0;

    for word in words {
        if !candidate.is_empty() {
            candidate.push(' ');
        }
        candidate.push_str(word);

        match parse_duration(&candidate) {
            Ok(duration) => {
                best = Some((duration, candidate.clone()));
                failures = 0;
            }
            Err(DurationError::InvalidFormat(_)) => {
                failures += 1;
                if failures >= config.max_consecutive_failures {
                    break;
                }
            }
            Err(e) => return Err(e),
        }
    }

    let (duration, matched) =
        best.ok_or_else(|| DurationError::InvalidFormat(text.trim().to_string()))?;

    Ok(ParsedDuration {
        duration: duration.max(config.floor()),
        matched,
    })
}

/// Render a duration the parser accepts back, e.g. `1d 2h 30m`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    if total == 0 {
        return "0s".into();
    }

    let parts = [
        (total / DAY, "d"),
        (total % DAY / HOUR, "h"),
        (total % HOUR / MINUTE, "m"),
        (total % MINUTE, "s"),
    ];

    parts
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect::<Vec<_>>()
        .join(" ")
}
