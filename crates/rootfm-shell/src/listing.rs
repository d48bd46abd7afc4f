//! Parser for one `ls -l`-style listing line.
//!
//! Expected shape:
//! `<permstring> <links> <uid> <gid> <size> [<weekday>] <month> <day> <time> <year> <name>`
//!
//! Metadata fields are whitespace-delimited; everything after the year
//! token's trailing whitespace run is the name, which may itself contain
//! spaces. Any field that fails to parse rejects the whole line — callers
//! skip rejected lines because shells interleave warnings with real output.

use std::path::MAIN_SEPARATOR;

use chrono::{LocalResult, TimeZone, Utc};
use rootfm_platform::Permissions;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// One parsed listing line.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    /// Entry name with any trailing separator and symlink arrow stripped.
    pub name: String,
    pub permissions: Permissions,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub owner: u32,
    pub group: u32,
    pub size: u64,
    /// UTC epoch milliseconds reconstructed from the textual date.
    pub modified: i64,
}

struct Fields<'a> {
    rest: &'a str,
}

impl<'a> Fields<'a> {
    fn token(&mut self) -> Option<&'a str> {
        self.rest = self.rest.trim_start();
        if self.rest.is_empty() {
            return None;
        }
        let end = self
            .rest
            .find(char::is_whitespace)
            .unwrap_or(self.rest.len());
        let (token, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(token)
    }

    /// Everything after the current position's leading whitespace run. This
    /// is what preserves embedded spaces in names.
    fn remainder(&self) -> &'a str {
        self.rest.trim_start()
    }
}

/// Parse one listing line, `None` when it is not a valid listing line.
pub fn parse_line(line: &str) -> Option<ListingRecord> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut fields = Fields { rest: line };

    let perm_token = fields.token()?;
    if perm_token.len() != 10 {
        return None;
    }
    let type_flag = perm_token.chars().next()?;
    if !matches!(type_flag, '-' | 'd' | 'l' | 'b' | 'c' | 's' | 'p') {
        return None;
    }
    let permissions = Permissions::from_symbolic(perm_token)?;

    let _links: u32 = fields.token()?.parse().ok()?;
    let owner: u32 = fields.token()?.parse().ok()?;
    let group: u32 = fields.token()?.parse().ok()?;
    let size: u64 = fields.token()?.parse().ok()?;

    let mut month_token = fields.token()?;
    if WEEKDAYS.iter().any(|w| w.eq_ignore_ascii_case(month_token)) {
        month_token = fields.token()?;
    }
    let month = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(month_token))? as u32
        + 1;

    let day: u32 = fields.token()?.parse().ok()?;
    if !(1..=31).contains(&day) {
        return None;
    }
    let (hour, minute, second) = parse_time(fields.token()?)?;
    let year: i32 = fields.token()?.parse().ok()?;
    if !(1970..=9999).contains(&year) {
        return None;
    }

    let raw_name = fields.remainder();
    if raw_name.is_empty() {
        return None;
    }

    // A symlink line reads `name -> target`; the target is not resolved
    // here, only stripped.
    let mut name = match raw_name.find("->") {
        Some(idx) => raw_name[..idx].trim_end(),
        None => raw_name,
    };
    let is_symlink = type_flag == 'l';

    // Trailing separator marks a directory (`ls -p`), independently of the
    // type flag.
    let mut is_dir = type_flag == 'd';
    if name.ends_with(MAIN_SEPARATOR) {
        is_dir = true;
        name = name.trim_end_matches(MAIN_SEPARATOR);
    }
    if name.is_empty() {
        return None;
    }

    let modified = match Utc.with_ymd_and_hms(year, month, day, hour, minute, second) {
        LocalResult::Single(dt) => dt.timestamp_millis(),
        _ => return None,
    };

    Some(ListingRecord {
        name: name.to_string(),
        permissions,
        is_dir,
        is_symlink,
        owner,
        group,
        size,
        modified,
    })
}

fn parse_time(token: &str) -> Option<(u32, u32, u32)> {
    let mut parts = token.split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = parts.next()?.parse().ok()?;
    let second: u32 = match parts.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || hour > 23 || minute > 59 || second > 59 {
        return None;
    }
    Some((hour, minute, second))
}
