//! Commit-level predicates applied when a commit is materialized

use crate::models::Commit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitFilter {
    /// Reject commits with more than one parent
    OnlyNoMerge,
    /// Accept commits that belong to at least one of the named branches
    OnlyInBranches(Vec<String>),
    OnlyInMainBranch,
    /// Accept commits touching at least one file with one of these extensions
    OnlyModificationsWithFileTypes(Vec<String>),
}

impl CommitFilter {
    /// True when the filter reads branch membership.
    pub fn needs_branches(&self) -> bool {
        matches!(
            self,
            CommitFilter::OnlyInBranches(_) | CommitFilter::OnlyInMainBranch
        )
    }

    pub fn accept(&self, commit: &Commit) -> bool {
        match self {
            CommitFilter::OnlyNoMerge => !commit.merge,
            CommitFilter::OnlyInBranches(branches) => {
                branches.iter().any(|b| commit.branches.contains(b))
            }
            CommitFilter::OnlyInMainBranch => commit.in_main_branch,
            CommitFilter::OnlyModificationsWithFileTypes(types) => {
                commit.modifications.iter().any(|m| {
                    types
                        .iter()
                        .any(|t| m.filename().ends_with(t.as_str()))
                })
            }
        }
    }
}

/// All filters must accept.
pub fn accept_all(filters: &[CommitFilter], commit: &Commit) -> bool {
    filters.iter().all(|f| f.accept(commit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Developer, Modification, ModificationType};
    use chrono::{FixedOffset, TimeZone};
    use std::collections::BTreeSet;

    fn commit(parents: &[&str]) -> Commit {
        let time = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap();
        Commit {
            id: "abc".into(),
            author: Developer::new("alice", "alice@example.com"),
            committer: Developer::new("alice", "alice@example.com"),
            author_time: time,
            committer_time: time,
            message: "msg".into(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            merge: parents.len() > 1,
            branches: BTreeSet::from(["main".to_string()]),
            in_main_branch: true,
            modifications: vec![Modification::new(
                None,
                Some("src/lib.rs".into()),
                ModificationType::Add,
                String::new(),
                None,
            )],
        }
    }

    #[test]
    fn test_only_no_merge() {
        let filter = CommitFilter::OnlyNoMerge;
        assert!(!filter.accept(&commit(&["p1", "p2"])));
        assert!(filter.accept(&commit(&["p1"])));
    }

    #[test]
    fn test_branch_filters() {
        let c = commit(&["p1"]);
        assert!(CommitFilter::OnlyInBranches(vec!["dev".into(), "main".into()]).accept(&c));
        assert!(!CommitFilter::OnlyInBranches(vec!["dev".into()]).accept(&c));
        assert!(CommitFilter::OnlyInMainBranch.accept(&c));
        assert!(CommitFilter::OnlyInMainBranch.needs_branches());
        assert!(!CommitFilter::OnlyNoMerge.needs_branches());
    }

    #[test]
    fn test_file_types_and_conjunction() {
        let c = commit(&["p1", "p2"]);
        let rs = CommitFilter::OnlyModificationsWithFileTypes(vec![".rs".into()]);
        let py = CommitFilter::OnlyModificationsWithFileTypes(vec![".py".into()]);
        assert!(rs.accept(&c));
        assert!(!py.accept(&c));
        assert!(!accept_all(&[rs, CommitFilter::OnlyNoMerge], &c));
        assert!(accept_all(&[], &c));
    }
}
