//! Commit ranges: which changesets a mining run considers
//!
//! Every range is a pure function over the provider's changeset list
//! (newest first). Variants that need the provider to resolve a name
//! (`OnlyInHead`, `BetweenTags`) are first turned into an id-based range by
//! [`CommitRange::resolve`].

use crate::error::{MineError, MineResult};
use crate::git::ScmProvider;
use crate::models::ChangeSet;
use chrono::{DateTime, Months, Utc};
use std::collections::HashSet;
use std::str::FromStr;

const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CommitRange {
    #[default]
    AllCommits,
    OnlyInHead,
    SingleCommit(String),
    ListOfCommits(Vec<String>),
    /// Open interval on both ends
    BetweenDates {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// Strictly after the given time
    SinceCommit(DateTime<Utc>),
    LastMonths(u32),
    DailyCommits(u32),
    BetweenTags {
        from: String,
        to: String,
    },
    /// Inclusive slice between two commit ids
    BetweenCommits {
        from: String,
        to: String,
    },
}

impl CommitRange {
    /// Select changesets from the provider's history.
    pub fn select(
        &self,
        scm: &dyn ScmProvider,
        first_parent_only: bool,
    ) -> MineResult<Vec<ChangeSet>> {
        let resolved = self.resolve(scm)?;
        let all = scm.list_change_sets(first_parent_only)?;
        resolved.filter(&all)
    }

    /// Replace name-based variants with id-based ones.
    pub fn resolve(&self, scm: &dyn ScmProvider) -> MineResult<CommitRange> {
        Ok(match self {
            CommitRange::OnlyInHead => CommitRange::SingleCommit(scm.resolve_head()?),
            CommitRange::BetweenTags { from, to } => CommitRange::BetweenCommits {
                from: scm.resolve_tag_to_commit(from)?,
                to: scm.resolve_tag_to_commit(to)?,
            },
            other => other.clone(),
        })
    }

    /// Apply the range to a newest-first changeset list.
    ///
    /// `OnlyInHead` keeps the first element. `BetweenTags` must be resolved first.
    pub fn filter(&self, all: &[ChangeSet]) -> MineResult<Vec<ChangeSet>> {
        match self {
            CommitRange::AllCommits => Ok(all.to_vec()),
            CommitRange::OnlyInHead => Ok(all.iter().take(1).cloned().collect()),
            CommitRange::SingleCommit(id) => all
                .iter()
                .find(|cs| &cs.id == id)
                .map(|cs| vec![cs.clone()])
                .ok_or_else(|| MineError::not_found("commit", id.clone())),
            CommitRange::ListOfCommits(ids) => {
                let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
                Ok(all
                    .iter()
                    .filter(|cs| wanted.contains(cs.id.as_str()))
                    .cloned()
                    .collect())
            }
            CommitRange::BetweenDates { from, to } => Ok(all
                .iter()
                .filter(|cs| cs.time > *from && cs.time < *to)
                .cloned()
                .collect()),
            CommitRange::SinceCommit(since) => Ok(all
                .iter()
                .filter(|cs| cs.time > *since)
                .cloned()
                .collect()),
            CommitRange::LastMonths(months) => last_months(all, *months),
            CommitRange::DailyCommits(days) => daily_commits(all, *days),
            CommitRange::BetweenTags { from, to } => Err(MineError::InvalidRange(format!(
                "tags {}..{} must be resolved before filtering",
                from, to
            ))),
            CommitRange::BetweenCommits { from, to } => between_commits(all, from, to),
        }
    }
}

fn last_months(all: &[ChangeSet], months: u32) -> MineResult<Vec<ChangeSet>> {
    let Some(first) = all.first() else {
        return Ok(Vec::new());
    };
    let anchor = first
        .time
        .checked_sub_months(Months::new(months))
        .ok_or_else(|| MineError::InvalidRange(format!("{} months before {}", months, first.time)))?;

    let mut kept = vec![first.clone()];
    kept.extend(all[1..].iter().filter(|cs| cs.time > anchor).cloned());
    Ok(kept)
}

fn daily_commits(all: &[ChangeSet], days: u32) -> MineResult<Vec<ChangeSet>> {
    let Some(first) = all.first() else {
        return Err(MineError::InvalidRange(
            "daily thinning needs at least one commit".to_string(),
        ));
    };
    let gap = i64::from(days) * MILLIS_PER_DAY;

    let mut kept = vec![first.clone()];
    for cs in &all[1..] {
        let last = kept.last().map(|k| k.time.timestamp_millis()).unwrap_or_default();
        if last - cs.time.timestamp_millis() >= gap {
            kept.push(cs.clone());
        }
    }
    Ok(kept)
}

fn between_commits(all: &[ChangeSet], from: &str, to: &str) -> MineResult<Vec<ChangeSet>> {
    let position = |id: &str| {
        all.iter()
            .position(|cs| cs.id == id)
            .ok_or_else(|| MineError::not_found("commit", id))
    };
    let a = position(from)?;
    let b = position(to)?;
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    Ok(all[lo..=hi].to_vec())
}

/// Parse the CLI range syntax: `all`, `head`, `commit:<id>`, `commits:<a,b>`,
/// `since:<rfc3339>`, `between:<rfc3339>..<rfc3339>`, `months:<n>`,
/// `daily:<n>`, `tags:<from>..<to>`, `range:<from>..<to>`.
impl FromStr for CommitRange {
    type Err = MineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = s.split_once(':').unwrap_or((s, ""));
        let bad = |why: &str| MineError::InvalidRange(format!("'{}': {}", s, why));
        let pair = |arg: &str| {
            arg.split_once("..")
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .ok_or_else(|| bad("expected <from>..<to>"))
        };
        let date = |arg: &str| {
            DateTime::parse_from_rfc3339(arg)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| bad(&e.to_string()))
        };
        let count = |arg: &str| arg.parse::<u32>().map_err(|e| bad(&e.to_string()));

        match kind {
            "all" => Ok(CommitRange::AllCommits),
            "head" => Ok(CommitRange::OnlyInHead),
            "commit" => Ok(CommitRange::SingleCommit(arg.to_string())),
            "commits" => Ok(CommitRange::ListOfCommits(
                arg.split(',').map(|s| s.trim().to_string()).collect(),
            )),
            "since" => Ok(CommitRange::SinceCommit(date(arg)?)),
            "between" => {
                let (from, to) = pair(arg)?;
                Ok(CommitRange::BetweenDates {
                    from: date(&from)?,
                    to: date(&to)?,
                })
            }
            "months" => Ok(CommitRange::LastMonths(count(arg)?)),
            "daily" => Ok(CommitRange::DailyCommits(count(arg)?)),
            "tags" => {
                let (from, to) = pair(arg)?;
                Ok(CommitRange::BetweenTags { from, to })
            }
            "range" => {
                let (from, to) = pair(arg)?;
                Ok(CommitRange::BetweenCommits { from, to })
            }
            _ => Err(bad("unknown range kind")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cs(id: &str, secs: i64) -> ChangeSet {
        ChangeSet::new(id, Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn ids(list: &[ChangeSet]) -> Vec<&str> {
        list.iter().map(|c| c.id.as_str()).collect()
    }

    fn day(n: i64) -> i64 {
        n * 86_400
    }

    #[test]
    fn test_since_commit_is_strict() {
        let all = vec![cs("c30", 30), cs("c20", 20), cs("c10", 10)];
        let since = CommitRange::SinceCommit(Utc.timestamp_opt(15, 0).unwrap());
        assert_eq!(ids(&since.filter(&all).unwrap()), vec!["c30", "c20"]);

        let at = CommitRange::SinceCommit(Utc.timestamp_opt(20, 0).unwrap());
        assert_eq!(ids(&at.filter(&all).unwrap()), vec!["c30"]);
    }

    #[test]
    fn test_between_dates_is_open() {
        let all = vec![cs("c30", 30), cs("c20", 20), cs("c10", 10)];
        let range = CommitRange::BetweenDates {
            from: Utc.timestamp_opt(10, 0).unwrap(),
            to: Utc.timestamp_opt(30, 0).unwrap(),
        };
        assert_eq!(ids(&range.filter(&all).unwrap()), vec!["c20"]);
    }

    #[test]
    fn test_single_commit_not_found() {
        let all = vec![cs("a", 1)];
        let err = CommitRange::SingleCommit("zzz".into()).filter(&all).unwrap_err();
        assert!(matches!(err, MineError::NotFound { .. }));
        assert_eq!(
            ids(&CommitRange::SingleCommit("a".into()).filter(&all).unwrap()),
            vec!["a"]
        );
    }

    #[test]
    fn test_list_of_commits_keeps_source_order() {
        let all = vec![cs("c", 3), cs("b", 2), cs("a", 1)];
        let range = CommitRange::ListOfCommits(vec!["a".into(), "c".into(), "missing".into()]);
        assert_eq!(ids(&range.filter(&all).unwrap()), vec!["c", "a"]);
    }

    #[test]
    fn test_daily_commits_thins_greedily() {
        let all = vec![
            cs("d10", day(10)),
            cs("d9", day(9) + 3600),
            cs("d8", day(8)),
            cs("d7", day(7)),
            cs("d1", day(1)),
        ];
        let kept = CommitRange::DailyCommits(2).filter(&all).unwrap();
        assert_eq!(ids(&kept), vec!["d10", "d8", "d1"]);

        for pair in kept.windows(2) {
            let gap = pair[0].time.timestamp_millis() - pair[1].time.timestamp_millis();
            assert!(gap >= 2 * MILLIS_PER_DAY);
        }
    }

    #[test]
    fn test_daily_commits_rejects_empty_input() {
        let err = CommitRange::DailyCommits(1).filter(&[]).unwrap_err();
        assert!(matches!(err, MineError::InvalidRange(_)));
    }

    #[test]
    fn test_last_months_anchors_on_first() {
        let newest = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let all = vec![
            ChangeSet::new("new", newest),
            ChangeSet::new("recent", Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
            ChangeSet::new("old", Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
        ];
        let kept = CommitRange::LastMonths(2).filter(&all).unwrap();
        assert_eq!(ids(&kept), vec!["new", "recent"]);
    }

    #[test]
    fn test_between_commits_inclusive_any_order() {
        let all = vec![cs("d", 4), cs("c", 3), cs("b", 2), cs("a", 1)];
        let forward = CommitRange::BetweenCommits {
            from: "b".into(),
            to: "d".into(),
        };
        let backward = CommitRange::BetweenCommits {
            from: "d".into(),
            to: "b".into(),
        };
        assert_eq!(ids(&forward.filter(&all).unwrap()), vec!["d", "c", "b"]);
        assert_eq!(forward.filter(&all).unwrap(), backward.filter(&all).unwrap());
    }

    #[test]
    fn test_filter_is_repeatable() {
        let all = vec![cs("c", day(5)), cs("b", day(3)), cs("a", day(1))];
        let ranges = [
            CommitRange::AllCommits,
            CommitRange::OnlyInHead,
            CommitRange::DailyCommits(1),
            CommitRange::LastMonths(1),
            CommitRange::SinceCommit(Utc.timestamp_opt(day(2), 0).unwrap()),
        ];
        for range in ranges {
            assert_eq!(range.filter(&all).unwrap(), range.filter(&all).unwrap());
        }
    }

    #[test]
    fn test_parse_range_syntax() {
        assert_eq!("all".parse::<CommitRange>().unwrap(), CommitRange::AllCommits);
        assert_eq!(
            "daily:3".parse::<CommitRange>().unwrap(),
            CommitRange::DailyCommits(3)
        );
        assert_eq!(
            "tags:v1..v2".parse::<CommitRange>().unwrap(),
            CommitRange::BetweenTags {
                from: "v1".into(),
                to: "v2".into()
            }
        );
        assert!("since:2024-01-01T00:00:00Z".parse::<CommitRange>().is_ok());
        assert!("bogus".parse::<CommitRange>().is_err());
        assert!("tags:v1".parse::<CommitRange>().is_err());
    }
}
