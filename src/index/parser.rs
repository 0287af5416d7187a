//! Parser for free-text issue lists.
//!
//! Catalog rows describe their contents as text such as
//! `"FF #1-30, Annual #1-2, Thing #10, 19, 23"`. Segments are separated by
//! commas; a bare number, range or `#n` continues the most recent series,
//! and a bare `Annual #n` attaches to it as an annual.
//!
//! Descriptive segments ("Miscellaneous", "plus tie-ins") carry no issue
//! references and are skipped. Anything else that cannot be read is
//! returned as a rejected segment so ingestion can report it.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::types::IssueId;

/// Largest number of issues a single range may expand to.
pub const MAX_RANGE_LEN: u32 = 1000;

/// Series abbreviations used in catalog text.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("FF", "Fantastic Four"),
    ("ASM", "Amazing Spider-Man"),
    ("AF", "Amazing Fantasy"),
    ("UXM", "Uncanny X-Men"),
    ("NXM", "New X-Men"),
    ("NM", "New Mutants"),
    ("MTIO", "Marvel Two-In-One"),
    ("PP:SM", "Peter Parker: The Spectacular Spider-Man"),
    ("PPTSSM", "Peter Parker: The Spectacular Spider-Man"),
    ("WCA", "West Coast Avengers"),
    ("NA", "New Avengers"),
    ("SW", "Secret Wars"),
    ("GotG", "Guardians of the Galaxy"),
    ("SSM", "Spectacular Spider-Man"),
    ("USM", "Ultimate Spider-Man"),
    ("DD", "Daredevil"),
    ("WBN", "Werewolf by Night"),
    ("GN", "Graphic Novel"),
    ("OGN", "Original Graphic Novel"),
    ("AvX", "Avengers vs. X-Men"),
];

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("issue-list pattern is a valid regex")
}

static SKIP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^miscellaneous$",
        r"(?i)^related$",
        r"(?i)^related\s+(miniseries|tie-ins|tie.ins|material)$",
        r"(?i)^specials$",
        r"(?i)^plus\s",
        r"(?i)^various\s",
        r"(?i)^multiple\s",
        r"(?i)^complete\s",
        r"(?i)^full\s",
        r"(?i)^collected\s+in\s+trades$",
        r"(?i)^ongoing$",
        r"(?i)^upcoming$",
        r"(?i)^\d{4}\s+crossover",
        r"(?i)^crossover\s+issues$",
        r"(?i)^and\s+(related|others|extensive|crossovers)",
        r"(?i)^extensive\s+crossover",
        r"(?i)material$",
        r"(?i)epilogues$",
        r"(?i)one-shots?\s+and\s+minis$",
        r"(?i)^free comic book day",
    ]
    .iter()
    .map(|p| re(p))
    .collect()
});

static TIE_IN_SUFFIX: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\s*\+\s*(tie-ins|crossovers|tie.ins|cross-overs|related)$"));
static TRAILING_NOTE: Lazy<Regex> = Lazy::new(|| re(r"\s*\([^)]*\)\s*$"));
static ABBREVIATION: Lazy<Regex> = Lazy::new(|| re(r"^([A-Za-z:.]+)\s*(\(\d{4}\))?$"));

static BARE_ANNUAL: Lazy<Regex> = Lazy::new(|| re(r"(?i)^annual$"));
static ANNUAL_RANGE: Lazy<Regex> = Lazy::new(|| re(r"(?i)^annual\s*#?(\d+)(?:\s*-\s*(\d+))?$"));
static SERIES_ANNUAL: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)^(.+?)\s+annual\s*#?(\d+)(?:\s*-\s*(\d+))?$"));
static SERIES_ISSUES: Lazy<Regex> = Lazy::new(|| re(r"^(.+?)\s*#(.+)$"));
static BARE_SPEC: Lazy<Regex> = Lazy::new(|| re(r"^\d+(?:\.\d+)?(?:\s*-\s*\d+(?:\.\d+)?)?$"));
static NAMED_ONE_SHOT: Lazy<Regex> = Lazy::new(|| re(r"^[A-Z][A-Za-z\s':&.?!/-]+$"));

static ONGOING: Lazy<Regex> = Lazy::new(|| re(r"(?i)^(\d+)\s*-\s*ongoing$"));
static FRACTIONAL_RANGE: Lazy<Regex> = Lazy::new(|| re(r"^(\d+)\.(\d+)\s*-\s*(\d+)\.(\d+)$"));
static RANGE: Lazy<Regex> = Lazy::new(|| re(r"^(\d+)\s*-\s*(\d+)(?:\.\d+)?$"));
static SINGLE: Lazy<Regex> = Lazy::new(|| re(r"^\d+(?:\.\d+)?$"));
static SUFFIXED: Lazy<Regex> = Lazy::new(|| re(r"^(\d+)[A-Za-z]+$"));

/// A segment that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedSegment {
    /// The segment text.
    pub segment: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Result of parsing one issue list.
#[derive(Debug, Clone, Default)]
pub struct ParsedIssueList {
    /// Issues in text order. May contain repeats; `Edition::new` merges them.
    pub issues: Vec<IssueId>,
    /// Segments that were neither issue references nor known descriptions.
    pub rejected: Vec<RejectedSegment>,
}

/// Parse an `issues_collected` text into issue identifiers.
pub fn parse_issue_list(text: &str) -> ParsedIssueList {
    let mut parsed = ParsedIssueList::default();
    let mut context: Option<String> = None;

    for raw in strip_description(text).split(',') {
        let segment = raw.trim();
        if segment.is_empty() || is_skippable(segment) {
            continue;
        }
        let segment = clean_segment(segment);
        if segment.is_empty() {
            continue;
        }
        if let Err(reason) = parse_segment(&segment, &mut context, &mut parsed.issues) {
            parsed.rejected.push(RejectedSegment { segment, reason });
        }
    }

    parsed
}

// A trailing em-dash clause with no issue numbers is commentary.
fn strip_description(text: &str) -> &str {
    match text.split_once('\u{2014}') {
        Some((head, tail)) if !tail.contains('#') && !tail.chars().any(|c| c.is_ascii_digit()) => {
            head.trim()
        }
        _ => text,
    }
}

fn is_skippable(segment: &str) -> bool {
    SKIP_PATTERNS.iter().any(|p| p.is_match(segment))
}

fn clean_segment(segment: &str) -> String {
    let s = TIE_IN_SUFFIX.replace(segment, "");
    let s = s.trim_end_matches('+').trim();
    TRAILING_NOTE.replace(s, "").trim().to_string()
}

fn expand_abbreviation(raw: &str) -> String {
    let raw = raw.trim();
    let Some(caps) = ABBREVIATION.captures(raw) else {
        return raw.to_string();
    };
    let abbr = caps.get(1).map_or("", |m| m.as_str());
    match ABBREVIATIONS.iter().find(|(short, _)| *short == abbr) {
        Some((_, full)) => match caps.get(2) {
            Some(year) => format!("{} {}", full, year.as_str()),
            None => full.to_string(),
        },
        None => raw.to_string(),
    }
}

fn parse_segment(
    segment: &str,
    context: &mut Option<String>,
    out: &mut Vec<IssueId>,
) -> Result<(), String> {
    if BARE_ANNUAL.is_match(segment) {
        let series = context.as_deref().ok_or("annual without a series")?;
        out.push(IssueId::new(series, "1", true));
        return Ok(());
    }

    if let Some(caps) = ANNUAL_RANGE.captures(segment) {
        let series = context.as_deref().ok_or("annual without a series")?;
        for number in expand_range(&caps[1], caps.get(2).map(|m| m.as_str()))? {
            out.push(IssueId::new(series, number, true));
        }
        return Ok(());
    }

    if let Some(caps) = SERIES_ANNUAL.captures(segment) {
        let series = expand_abbreviation(&caps[1]);
        for number in expand_range(&caps[2], caps.get(3).map(|m| m.as_str()))? {
            out.push(IssueId::new(&series, number, true));
        }
        *context = Some(series);
        return Ok(());
    }

    if let Some(spec) = segment.strip_prefix('#') {
        let series = context.as_deref().ok_or("issue number without a series")?;
        for number in parse_issue_spec(spec)? {
            out.push(IssueId::new(series, number, false));
        }
        return Ok(());
    }

    if let Some(caps) = SERIES_ISSUES.captures(segment) {
        let series = expand_abbreviation(&caps[1]);
        for number in parse_issue_spec(&caps[2])? {
            out.push(IssueId::new(&series, number, false));
        }
        *context = Some(series);
        return Ok(());
    }

    if BARE_SPEC.is_match(segment) {
        let series = context.as_deref().ok_or("issue number without a series")?;
        for number in parse_issue_spec(segment)? {
            out.push(IssueId::new(series, number, false));
        }
        return Ok(());
    }

    // Named one-shots ("Ignition", "Sentry/Fantastic Four") count as #1.
    if NAMED_ONE_SHOT.is_match(segment) && segment.split_whitespace().count() <= 10 {
        out.push(IssueId::new(segment, "1", false));
        return Ok(());
    }

    Err("unrecognized issue reference".to_string())
}

fn parse_issue_spec(spec: &str) -> Result<Vec<String>, String> {
    let spec = spec.trim().trim_start_matches('#').trim_end_matches('+').trim();

    if let Some(caps) = ONGOING.captures(spec) {
        return Ok(vec![caps[1].to_string()]);
    }

    if let Some(caps) = FRACTIONAL_RANGE.captures(spec) {
        if caps[1] == caps[3] {
            let start = parse_number(&caps[2])?;
            let end = parse_number(&caps[4])?;
            check_range(start, end)?;
            let width = caps[2].len();
            return Ok((start..=end)
                .map(|sub| format!("{}.{:0width$}", &caps[1], sub, width = width))
                .collect());
        }
        return expand_range(&caps[1], Some(&caps[3]));
    }

    if let Some(caps) = RANGE.captures(spec) {
        return expand_range(&caps[1], Some(&caps[2]));
    }

    if SINGLE.is_match(spec) {
        return Ok(vec![spec.to_string()]);
    }

    if let Some(caps) = SUFFIXED.captures(spec) {
        return Ok(vec![caps[1].to_string()]);
    }

    Err(format!("unrecognized issue number '{}'", spec))
}

fn expand_range(start: &str, end: Option<&str>) -> Result<Vec<String>, String> {
    let start = parse_number(start)?;
    let end = match end {
        Some(end) => parse_number(end)?,
        None => start,
    };
    check_range(start, end)?;
    Ok((start..=end).map(|n| n.to_string()).collect())
}

fn check_range(start: u32, end: u32) -> Result<(), String> {
    if end < start {
        return Err(format!("descending range {}-{}", start, end));
    }
    if end - start >= MAX_RANGE_LEN {
        return Err(format!(
            "range {}-{} exceeds {} issues",
            start, end, MAX_RANGE_LEN
        ));
    }
    Ok(())
}

fn parse_number(s: &str) -> Result<u32, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("issue number '{}' out of range", s.trim()))
}
