// 🧭 Column Resolution - heuristic header detection for entrant CSVs
// Headers are free-form, so every function here is pure and returns an
// optional/variant result instead of guessing silently.

use serde::Serialize;

/// Number of eligibility criteria tracked per entrant
pub const CRITERIA_COUNT: usize = 4;

/// Username headers, highest priority first
const USERNAME_HEADERS: [&str; 3] = ["instagramhandle", "username", "handle"];

const FIRST_NAME_HEADERS: [&str; 3] = ["firstname", "fname", "first"];
const LAST_NAME_HEADERS: [&str; 3] = ["lastname", "lname", "last"];
const ATTENDANCE_HEADERS: [&str; 4] = ["inattendance", "attendance", "attended", "present"];

/// Separators tried, in order, when splitting a combined criteria value
const COMBINED_SEPARATORS: [char; 5] = [',', ';', '|', '/', ' '];

/// A resolved column: position in the record plus the header as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub index: usize,
    pub header: String,
}

impl Column {
    fn new(index: usize, header: &str) -> Self {
        Column {
            index,
            header: header.to_string(),
        }
    }
}

/// Where the four criteria values live in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CriteriaColumns {
    /// At least one `cN` column was found; missing indexes default to false
    PerColumn([Option<Column>; CRITERIA_COUNT]),

    /// One field encodes all four values (e.g. `c1c2c3c4` = `1,0,1,1`)
    Combined(Column),

    /// No criteria information in the file
    Absent,
}

/// Every column the importer cares about, resolved once per file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnLayout {
    pub username: Option<Column>,
    pub first_name: Option<Column>,
    pub last_name: Option<Column>,
    pub attendance: Option<Column>,
    pub criteria: CriteriaColumns,
}

impl ColumnLayout {
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Self {
        ColumnLayout {
            username: resolve_username_column(headers),
            first_name: find_named(headers, &FIRST_NAME_HEADERS),
            last_name: find_named(headers, &LAST_NAME_HEADERS),
            attendance: find_named(headers, &ATTENDANCE_HEADERS),
            criteria: resolve_criteria_columns(headers),
        }
    }
}

/// Lower-case with whitespace, `_` and `-` removed: `"Instagram Handle"` → `"instagramhandle"`
fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn find_named<S: AsRef<str>>(headers: &[S], candidates: &[&str]) -> Option<Column> {
    candidates.iter().find_map(|candidate| {
        headers
            .iter()
            .position(|h| header_key(h.as_ref()) == *candidate)
            .map(|index| Column::new(index, headers[index].as_ref()))
    })
}

/// Username column: `instagram_handle` > `username` > `handle`, else the first column
pub fn resolve_username_column<S: AsRef<str>>(headers: &[S]) -> Option<Column> {
    find_named(headers, &USERNAME_HEADERS)
        .or_else(|| headers.first().map(|h| Column::new(0, h.as_ref())))
}

/// Criterion numbers (1..=4) mentioned by a header, in order of appearance
///
/// A token is a `c` loosely followed (spaces, `_`, `-`) by a digit run.
/// `c12` is criterion 12 and therefore ignored, so it never passes for `c1`.
///
/// Deliberately stricter than a plain substring test for `c1`: with substring
/// matching `c12` would count as `c1`, and a `c1c2c3c4` header would be taken
/// as the per-column c1 and never reach the combined-column path.
fn criterion_tokens(header: &str) -> Vec<usize> {
    let chars: Vec<char> = header.to_lowercase().chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != 'c' {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && (chars[j].is_whitespace() || chars[j] == '_' || chars[j] == '-') {
            j += 1;
        }

        let digits_start = j;
        while j < chars.len() && chars[j].is_ascii_digit() {
            j += 1;
        }

        if j > digits_start {
            let number: String = chars[digits_start..j].iter().collect();
            if let Ok(n) = number.parse::<usize>() {
                if (1..=CRITERIA_COUNT).contains(&n) {
                    tokens.push(n);
                }
            }
            i = j;
        } else {
            i += 1;
        }
    }

    tokens
}

/// Header mentions c1..c4 in sequence, the `c1c2` shorthand, or the word "criteria"
fn looks_combined(header: &str) -> bool {
    let key = header_key(header);
    if key.contains("criteria") || key.contains("c1c2") {
        return true;
    }

    let mut wanted = 1;
    for token in criterion_tokens(header) {
        if token == wanted {
            wanted += 1;
        }
    }
    wanted > CRITERIA_COUNT
}

/// Locate per-criterion columns, falling back to a single combined column
///
/// # Strategy:
/// 1. For each index 1..=4 take the first header naming exactly that
///    criterion (`c1`, `C 1`, `score_c1`). Headers naming several criteria
///    are combined-column candidates, not per-column ones.
/// 2. Only if no per-column header exists at all, take the first header that
///    looks combined (`c1c2c3c4`, `c1/c2/c3/c4`, `Criteria`).
pub fn resolve_criteria_columns<S: AsRef<str>>(headers: &[S]) -> CriteriaColumns {
    let mut per_column: [Option<Column>; CRITERIA_COUNT] = Default::default();

    for (slot, criterion) in per_column.iter_mut().zip(1..=CRITERIA_COUNT) {
        *slot = headers.iter().enumerate().find_map(|(index, h)| {
            let tokens = criterion_tokens(h.as_ref());
            let names_only_this = !tokens.is_empty() && tokens.iter().all(|t| *t == criterion);
            names_only_this.then(|| Column::new(index, h.as_ref()))
        });
    }

    if per_column.iter().any(Option::is_some) {
        return CriteriaColumns::PerColumn(per_column);
    }

    headers
        .iter()
        .position(|h| looks_combined(h.as_ref()))
        .map(|index| CriteriaColumns::Combined(Column::new(index, headers[index].as_ref())))
        .unwrap_or(CriteriaColumns::Absent)
}

/// Split one combined criteria field into `expected_count` fragments
///
/// Tries each separator in turn (`,` `;` `|` `/` space), dropping empty
/// fragments. A separator-free value of exactly `expected_count` `0`/`1`
/// characters is split per character. Anything else is `None`, and the
/// caller falls back to all-false.
pub fn split_combined(value: &str, expected_count: usize) -> Option<Vec<String>> {
    let value = value.trim();

    for sep in COMBINED_SEPARATORS {
        if value.contains(sep) {
            let parts: Vec<String> = value
                .split(sep)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            if parts.len() == expected_count {
                return Some(parts);
            }
        }
    }

    if value.chars().count() == expected_count && value.chars().all(|c| c == '0' || c == '1') {
        return Some(value.chars().map(String::from).collect());
    }

    None
}
