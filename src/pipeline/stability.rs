//! Commit stability
//!
//! A commit is stable when the lines it wrote survive the following month.
//! The follow-up commit is the newest-first neighbour closest in time that
//! lands strictly after the target and less than one month later. The score
//! is `1 - overlap / written`, where `written` counts the lines the target
//! added or rewrote in files the follow-up also touches, and `overlap` is
//! the part of those lines the follow-up rewrites.

use crate::error::MineResult;
use crate::git::ScmProvider;
use crate::models::{ChangeSet, FileEdits, LineEdit};
use chrono::Months;

pub struct StabilityAnalyzer;

impl StabilityAnalyzer {
    /// Index of the follow-up commit for `commits[index]` in a newest-first list.
    pub fn follow_up_index(commits: &[ChangeSet], index: usize) -> Option<usize> {
        let target = commits.get(index)?;
        let horizon = target.time.checked_add_months(Months::new(1))?;
        (0..index)
            .rev()
            .find(|&i| commits[i].time > target.time && commits[i].time < horizon)
    }

    /// Score the target's edits (parent -> target) against the follow-up's (target -> follow-up).
    pub fn score(target: &[FileEdits], follow_up: &[FileEdits]) -> f64 {
        let mut written = 0u64;
        let mut overlap = 0u64;

        for file in target {
            let path = file.path();
            let Some(later) = follow_up.iter().find(|f| f.touches(path)) else {
                continue;
            };
            if file.edits.is_empty() || later.edits.is_empty() {
                continue;
            }
            written += file.edits.iter().map(|e| u64::from(e.len_b())).sum::<u64>();

            let rewritten = merge_ranges(&later.edits);
            for edit in &file.edits {
                for &(start, end) in &rewritten {
                    let lo = edit.begin_b.max(start);
                    let hi = edit.end_b.min(end);
                    if lo < hi {
                        overlap += u64::from(hi - lo);
                    }
                }
            }
        }

        if written == 0 {
            return 1.0;
        }
        let value = 1.0 - overlap as f64 / written as f64;
        if value.is_finite() {
            value
        } else {
            1.0
        }
    }

    /// Stability of `commits[index]`.
    ///
    /// `target_edits` may carry the already computed parent -> target edits.
    pub fn analyze(
        scm: &dyn ScmProvider,
        commits: &[ChangeSet],
        index: usize,
        target_edits: Option<&[FileEdits]>,
    ) -> MineResult<f64> {
        let Some(next) = Self::follow_up_index(commits, index) else {
            return Ok(1.0);
        };
        let target = &commits[index].id;
        let parents = scm.parents(target)?;
        let Some(parent) = parents.first() else {
            return Ok(1.0);
        };

        let owned;
        let target_edits = match target_edits {
            Some(edits) => edits,
            None => {
                owned = scm.file_edits(Some(parent), target)?;
                owned.as_slice()
            }
        };
        let follow_up = scm.file_edits(Some(target), &commits[next].id)?;
        Ok(Self::score(target_edits, &follow_up))
    }
}

/// Merge the follow-up's old-side ranges, which live in the target's line space.
fn merge_ranges(edits: &[LineEdit]) -> Vec<(u32, u32)> {
    let mut ranges: Vec<(u32, u32)> = edits.iter().map(|e| (e.begin_a, e.end_a)).collect();
    ranges.sort_unstable();

    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModificationType;
    use chrono::{TimeZone, Utc};

    fn edit(begin_a: u32, end_a: u32, begin_b: u32, end_b: u32) -> LineEdit {
        LineEdit {
            begin_a,
            end_a,
            begin_b,
            end_b,
            size_bytes: 0,
        }
    }

    fn file(path: &str, edits: Vec<LineEdit>) -> FileEdits {
        FileEdits {
            old_path: Some(path.into()),
            new_path: Some(path.into()),
            change_type: ModificationType::Modify,
            edits,
            size_after: 0,
        }
    }

    fn cs(id: &str, day: u32) -> ChangeSet {
        ChangeSet::new(id, Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_untouched_lines_are_stable() {
        let target = vec![file("a.rs", vec![edit(0, 0, 0, 10)])];
        let later = vec![file("a.rs", vec![edit(20, 22, 20, 22)])];
        assert_eq!(StabilityAnalyzer::score(&target, &later), 1.0);
    }

    #[test]
    fn test_rewritten_lines_reduce_stability() {
        // target writes lines 0..10; follow-up rewrites lines 5..10 of that version
        let target = vec![file("a.rs", vec![edit(0, 0, 0, 10)])];
        let later = vec![file("a.rs", vec![edit(5, 8, 5, 6), edit(7, 10, 6, 6)])];
        assert!((StabilityAnalyzer::score(&target, &later) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_unrelated_files_are_ignored() {
        let target = vec![file("a.rs", vec![edit(0, 0, 0, 4)])];
        let later = vec![file("b.rs", vec![edit(0, 4, 0, 4)])];
        assert_eq!(StabilityAnalyzer::score(&target, &later), 1.0);
        assert_eq!(StabilityAnalyzer::score(&[], &later), 1.0);
    }

    #[test]
    fn test_only_files_the_follow_up_touches_count() {
        let target = vec![
            file("a.rs", vec![edit(0, 0, 0, 10)]),
            file("b.rs", vec![edit(0, 0, 0, 3)]),
        ];
        let later = vec![file("a.rs", vec![edit(0, 5, 0, 5)])];
        assert!((StabilityAnalyzer::score(&target, &later) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_deletion_only_target_is_stable() {
        let target = vec![file("a.rs", vec![edit(0, 3, 0, 0)])];
        let later = vec![file("a.rs", vec![edit(0, 2, 0, 2)])];
        assert_eq!(StabilityAnalyzer::score(&target, &later), 1.0);
    }

    #[test]
    fn test_renamed_follow_up_matches_old_path() {
        let target = vec![file("a.rs", vec![edit(0, 0, 0, 4)])];
        let later = vec![FileEdits {
            old_path: Some("a.rs".into()),
            new_path: Some("b.rs".into()),
            change_type: ModificationType::Rename,
            edits: vec![edit(0, 4, 0, 1)],
            size_after: 0,
        }];
        assert_eq!(StabilityAnalyzer::score(&target, &later), 0.0);
    }

    #[test]
    fn test_follow_up_index_picks_closest_newer() {
        // newest first
        let commits = vec![cs("far", 30), cs("mid", 20), cs("near", 12), cs("target", 10)];
        assert_eq!(StabilityAnalyzer::follow_up_index(&commits, 3), Some(2));
        assert_eq!(StabilityAnalyzer::follow_up_index(&commits, 0), None);
    }

    #[test]
    fn test_follow_up_outside_month_is_ignored() {
        let commits = vec![
            ChangeSet::new("late", Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            ChangeSet::new("same", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ChangeSet::new("target", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        ];
        assert_eq!(StabilityAnalyzer::follow_up_index(&commits, 2), None);
    }
}
