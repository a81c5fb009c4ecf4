//! Input validation for free-text answers collected by the flows.
//!
//! Every function returns `Error::Validation` with a message that can be
//! shown to the user as-is, so handlers can re-prompt without rewording.

use crate::error::{Error, Result};
use crate::models::insurance::Addon;
use chrono::{DateTime, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

/// Largest amount accepted for a fixed-amount payment code, in RWF.
pub const MAX_QR_AMOUNT: u64 = 10_000_000;

/// Longest cover an edited end date may give.
pub const MAX_COVER_MONTHS: u32 = 12;

static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^07[2389]\d{7}$").expect("static phone pattern"));

static PLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^R[A-Z]{2}\d{3}[A-Z]$").expect("static plate pattern"));

fn invalid(message: impl Into<String>) -> Error {
    Error::Validation(message.into())
}

fn strip_separators(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Validates a Rwandan mobile money number and returns it as `07XXXXXXXX`.
///
/// Accepts the local form or the `+250` / `250` international prefixes,
/// with spaces or dashes anywhere.
///
/// # Examples
/// ```
/// use chatflows::validation::validate_phone_number;
///
/// assert_eq!(validate_phone_number("+250 788 123 456").unwrap(), "0788123456");
/// assert!(validate_phone_number("0712345").is_err());
/// ```
pub fn validate_phone_number(input: &str) -> Result<String> {
    let compact = strip_separators(input);
    if compact.is_empty() {
        return Err(invalid("Phone number cannot be empty"));
    }

    let local = if let Some(rest) = compact.strip_prefix("+250") {
        format!("0{rest}")
    } else if let Some(rest) = compact.strip_prefix("250").filter(|r| r.len() == 9) {
        format!("0{rest}")
    } else {
        compact
    };

    if !PHONE_REGEX.is_match(&local) {
        return Err(invalid(
            "Invalid phone number. Use an MTN or Airtel number like 0788123456",
        ));
    }
    Ok(local)
}

/// Validates a merchant MoMo pay code: 4 to 9 digits.
pub fn validate_momo_code(input: &str) -> Result<String> {
    let code = strip_separators(input);
    if code.is_empty() {
        return Err(invalid("MoMo code cannot be empty"));
    }
    if !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("MoMo code must contain digits only"));
    }
    if !(4..=9).contains(&code.len()) {
        return Err(invalid("MoMo code must be 4 to 9 digits long"));
    }
    Ok(code)
}

/// Parses a payment amount in RWF. Thousands separators and a trailing
/// `rwf` are tolerated.
pub fn validate_amount(input: &str) -> Result<u64> {
    let lowered = input.trim().to_lowercase();
    let digits: String = lowered
        .trim_end_matches("rwf")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("Please enter the amount as a whole number, e.g. 5000"));
    }

    let amount: u64 = digits
        .parse()
        .map_err(|_| invalid(format!("Amount cannot exceed {MAX_QR_AMOUNT} RWF")))?;
    if amount == 0 {
        return Err(invalid("Amount must be greater than zero"));
    }
    if amount > MAX_QR_AMOUNT {
        return Err(invalid(format!("Amount cannot exceed {MAX_QR_AMOUNT} RWF")));
    }
    Ok(amount)
}

/// Validates a Rwandan plate number (`RAB123C`), ignoring spaces and case.
pub fn validate_plate_number(input: &str) -> Result<String> {
    let plate: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if plate.is_empty() {
        return Err(invalid("Plate number cannot be empty"));
    }
    if !PLATE_REGEX.is_match(&plate) {
        return Err(invalid("Invalid plate number. Use the format RAB123C"));
    }
    Ok(plate)
}

/// Parses `DD/MM/YYYY` or `YYYY-MM-DD`.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(input, "%Y-%m-%d"))
        .map_err(|_| invalid("Invalid date. Use DD/MM/YYYY, e.g. 01/12/2026"))
}

/// Parses a cover start date that must not be earlier than `today`.
pub fn validate_start_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let date = parse_date(input)?;
    if date < today {
        return Err(invalid("Start date cannot be in the past"));
    }
    Ok(date)
}

/// Parses an edited cover end date: after `start`, at most twelve months on.
pub fn validate_end_date(input: &str, start: NaiveDate) -> Result<NaiveDate> {
    let date = parse_date(input)?;
    if date <= start {
        return Err(invalid("End date must be after the start date"));
    }

    // Last covered day of a full term, as for a fixed period.
    let latest = start
        .checked_add_months(Months::new(MAX_COVER_MONTHS))
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| invalid("Start date is out of range"))?;
    if date > latest {
        return Err(invalid(format!(
            "Cover cannot exceed {MAX_COVER_MONTHS} months (latest end date {})",
            latest.format("%d/%m/%Y")
        )));
    }
    Ok(date)
}

/// Parses a trip time relative to the user's local `now`.
///
/// Accepts `YYYY-MM-DD HH:MM`, `today HH:MM` and `tomorrow HH:MM`. The time
/// must be in the future.
pub fn parse_schedule_time(input: &str, now: DateTime<FixedOffset>) -> Result<DateTime<Utc>> {
    const HELP: &str = "Invalid time. Use YYYY-MM-DD HH:MM, today HH:MM or tomorrow HH:MM";

    let lowered = input.trim().to_lowercase();
    let parts: Vec<&str> = lowered.split_whitespace().collect();
    let [day, time] = parts.as_slice() else {
        return Err(invalid(HELP));
    };

    let time = NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| invalid(HELP))?;
    let today = now.date_naive();
    let date = match *day {
        "today" => today,
        "tomorrow" => today.succ_opt().ok_or_else(|| invalid(HELP))?,
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").map_err(|_| invalid(HELP))?,
    };

    let local = NaiveDateTime::new(date, time)
        .and_local_timezone(*now.offset())
        .single()
        .ok_or_else(|| invalid(HELP))?;

    if local <= now {
        return Err(invalid("That time has already passed. Please choose a future time"));
    }
    if local > now + TimeDelta::days(365) {
        return Err(invalid("Trips can be scheduled at most a year ahead"));
    }
    Ok(local.with_timezone(&Utc))
}

/// Parses an add-on answer: comma-separated ids, or `none`.
///
/// Returns the add-ons sorted and without duplicates. `none` yields an empty
/// list, which is a valid answer.
pub fn parse_addons(input: &str) -> Result<Vec<Addon>> {
    let lowered = input.trim().to_lowercase();
    if lowered.is_empty() {
        return Err(invalid("Please choose add-ons or reply none"));
    }
    if lowered == "none" {
        return Ok(Vec::new());
    }

    let mut addons = Vec::new();
    for token in lowered.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let addon = Addon::from_str(&token.replace(' ', "_"))
            .map_err(|_| invalid(format!("Unknown add-on '{token}'. Options: comesa, pa, none")))?;
        addons.push(addon);
    }
    addons.sort();
    addons.dedup();
    Ok(addons)
}
