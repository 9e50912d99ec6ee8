// ✅ Eligibility Policy - one rule per deployment
// Chosen once at startup and passed to every draw; never per call.

use crate::db::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EligibilityPolicy {
    /// Only entrants checked in at the event
    Attendance,

    /// Entrants meeting all four criteria
    Criteria,

    /// Every registered entrant
    Open,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        EligibilityPolicy::Criteria
    }
}

impl EligibilityPolicy {
    /// Does this entry qualify? Selection state is not considered here.
    pub fn is_eligible(&self, entry: &Entry) -> bool {
        match self {
            EligibilityPolicy::Attendance => entry.in_attendance,
            EligibilityPolicy::Criteria => entry.criteria.iter().all(|met| *met),
            EligibilityPolicy::Open => true,
        }
    }

    /// The same rule as a SQL predicate over the `entries` table
    ///
    /// Must stay equivalent to `is_eligible`; the draw combines it with
    /// `is_selected = 0` to build the pool inside the draw transaction.
    pub fn sql_predicate(&self) -> &'static str {
        match self {
            EligibilityPolicy::Attendance => "in_attendance = 1",
            EligibilityPolicy::Criteria => "c1 = 1 AND c2 = 1 AND c3 = 1 AND c4 = 1",
            EligibilityPolicy::Open => "1 = 1",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EligibilityPolicy::Attendance => "attendance",
            EligibilityPolicy::Criteria => "criteria",
            EligibilityPolicy::Open => "open",
        }
    }
}

impl fmt::Display for EligibilityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown eligibility policy '{0}' (expected attendance, criteria or open)")]
pub struct UnknownPolicy(pub String);

impl FromStr for EligibilityPolicy {
    type Err = UnknownPolicy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "attendance" | "attended" => Ok(EligibilityPolicy::Attendance),
            "criteria" | "full" | "all-criteria" => Ok(EligibilityPolicy::Criteria),
            "open" | "all" | "none" => Ok(EligibilityPolicy::Open),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_entry, setup_database, NewEntry};
    use rusqlite::Connection;

    fn entry(criteria: [bool; 4], in_attendance: bool) -> Entry {
        Entry {
            criteria,
            in_attendance,
            ..Entry::blank("someone")
        }
    }

    #[test]
    fn test_attendance_policy() {
        let policy = EligibilityPolicy::Attendance;
        assert!(policy.is_eligible(&entry([false; 4], true)));
        assert!(!policy.is_eligible(&entry([true; 4], false)));
    }

    #[test]
    fn test_criteria_policy_needs_all_four() {
        let policy = EligibilityPolicy::Criteria;
        assert!(policy.is_eligible(&entry([true; 4], false)));
        assert!(!policy.is_eligible(&entry([true, false, true, true], true)));
        assert!(!policy.is_eligible(&entry([false; 4], true)));
    }

    #[test]
    fn test_open_policy_accepts_everyone() {
        let policy = EligibilityPolicy::Open;
        assert!(policy.is_eligible(&entry([false; 4], false)));
    }

    #[test]
    fn test_selected_flag_is_not_part_of_eligibility() {
        let mut e = entry([true; 4], true);
        e.is_selected = true;
        assert!(EligibilityPolicy::Criteria.is_eligible(&e));
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("Attendance".parse::<EligibilityPolicy>(), Ok(EligibilityPolicy::Attendance));
        assert_eq!(" criteria ".parse::<EligibilityPolicy>(), Ok(EligibilityPolicy::Criteria));
        assert_eq!("open".parse::<EligibilityPolicy>(), Ok(EligibilityPolicy::Open));
        let err = "Weighted".parse::<EligibilityPolicy>().unwrap_err();
        assert_eq!(err, UnknownPolicy("weighted".to_string()));
        assert_eq!(
            err.to_string(),
            "unknown eligibility policy 'weighted' (expected attendance, criteria or open)"
        );
        assert_eq!(EligibilityPolicy::default(), EligibilityPolicy::Criteria);
    }

    #[test]
    fn test_sql_predicate_matches_in_memory_rule() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let fixtures = [
            ("all", [true; 4], true),
            ("three", [true, true, false, true], true),
            ("none", [false; 4], false),
            ("criteria_only", [true; 4], false),
        ];
        for (handle, criteria, in_attendance) in fixtures {
            insert_entry(
                &conn,
                &NewEntry {
                    handle: handle.to_string(),
                    criteria,
                    in_attendance,
                    ..NewEntry::default()
                },
            )
            .unwrap();
        }

        let all = crate::db::list_entries(&conn).unwrap();
        for policy in [
            EligibilityPolicy::Attendance,
            EligibilityPolicy::Criteria,
            EligibilityPolicy::Open,
        ] {
            let mut from_sql: Vec<String> = crate::db::find_eligible(&conn, policy)
                .unwrap()
                .into_iter()
                .map(|e| e.handle)
                .collect();
            let mut in_memory: Vec<String> = all
                .iter()
                .filter(|e| policy.is_eligible(e))
                .map(|e| e.handle.clone())
                .collect();
            from_sql.sort();
            in_memory.sort();
            assert_eq!(from_sql, in_memory, "policy {} disagrees", policy);
        }
    }
}
