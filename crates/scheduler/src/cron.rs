//! Cron expression parser supporting standard 5-field expressions:
//! `minute hour day-of-month month day-of-week`.
//!
//! Day-of-week accepts numbers (`0` = Sunday) and three-letter names
//! (`sun`..`sat`), so `0 9 * * mon,wed` and `0 9 * * 1,3` are equivalent.

use chrono::{DateTime, Datelike, TimeZone, Timelike};

const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// A parsed 5-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    pub(crate) minutes: Vec<u32>,
    pub(crate) hours: Vec<u32>,
    pub(crate) days_of_month: Vec<u32>,
    pub(crate) months: Vec<u32>,
    pub(crate) days_of_week: Vec<u32>, // 0=Sun, 6=Sat
}

impl CronExpr {
    /// Parse a standard 5-field cron expression.
    ///
    /// Supports: `*`, `*/N` (step), `N` (literal), `N-M` (range), `N,M` (list).
    pub fn parse(expr: &str) -> Result<Self, String> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!(
                "Expected 5 fields (minute hour dom month dow), got {}",
                fields.len()
            ));
        }

        Ok(CronExpr {
            minutes: Self::parse_field(fields[0], 0, 59)?,
            hours: Self::parse_field(fields[1], 0, 23)?,
            days_of_month: Self::parse_field(fields[2], 1, 31)?,
            months: Self::parse_field(fields[3], 1, 12)?,
            days_of_week: Self::parse_field(&Self::day_names_to_numbers(fields[4]), 0, 6)?,
        })
    }

    fn day_names_to_numbers(field: &str) -> String {
        let mut field = field.to_ascii_lowercase();
        for (n, name) in DAY_NAMES.iter().enumerate() {
            field = field.replace(name, &n.to_string());
        }
        field
    }

    fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>, String> {
        let mut values = Vec::new();

        for part in field.split(',') {
            let part = part.trim();

            if let Some((base, step)) = part.split_once('/') {
                // Step: */N or M-N/S
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("Invalid step: {step}"))?;
                if step == 0 {
                    return Err("Step cannot be zero".into());
                }
                let (start, end) = if base == "*" {
                    (min, max)
                } else if base.contains('-') {
                    Self::parse_range(base, min, max)?
                } else {
                    (Self::parse_value(base, min, max)?, max)
                };
                values.extend((start..=end).step_by(step as usize));
            } else if part.contains('-') {
                let (start, end) = Self::parse_range(part, min, max)?;
                values.extend(start..=end);
            } else if part == "*" {
                values.extend(min..=max);
            } else {
                values.push(Self::parse_value(part, min, max)?);
            }
        }

        values.sort_unstable();
        values.dedup();
        if values.is_empty() {
            return Err("Field produced no values".into());
        }
        Ok(values)
    }

    fn parse_value(s: &str, min: u32, max: u32) -> Result<u32, String> {
        let v: u32 = s.parse().map_err(|_| format!("Invalid number: {s}"))?;
        if v < min || v > max {
            return Err(format!("{v} out of range {min}-{max}"));
        }
        Ok(v)
    }

    fn parse_range(s: &str, min: u32, max: u32) -> Result<(u32, u32), String> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid range: {s}"))?;
        let start: u32 = start
            .parse()
            .map_err(|_| format!("Invalid range start: {start}"))?;
        let end: u32 = end
            .parse()
            .map_err(|_| format!("Invalid range end: {end}"))?;
        if start < min || end > max || start > end {
            return Err(format!("Range {start}-{end} invalid for {min}-{max}"));
        }
        Ok((start, end))
    }

    /// Check if the given datetime (in its own timezone) matches.
    pub fn matches<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> bool {
        let dow = dt.weekday().num_days_from_sunday();

        self.minutes.contains(&dt.minute())
            && self.hours.contains(&dt.hour())
            && self.days_of_month.contains(&dt.day())
            && self.months.contains(&dt.month())
            && self.days_of_week.contains(&dow)
    }
}
