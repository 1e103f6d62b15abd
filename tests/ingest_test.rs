//! Commit ingestion against a real repository and an in-memory store

mod common;

use common::{lines, memory_store, TestRepo, ALICE, BOB, DAY, EPOCH};
use repominer::filters::{ChangeSelector, CommitFilter, CommitRange};
use repominer::git::ProviderOptions;
use repominer::pipeline::CommitIngestor;
use repominer::store::StoreConnector;

/// README, then three files, then {+5/-2, +0/-3, +1/-1} over those files.
fn three_file_history() -> (TestRepo, Vec<String>) {
    let repo = TestRepo::new();
    let root = repo.commit(&[("README", Some("demo\n"))], ALICE, EPOCH, "root");

    let a = lines("a", 1..=10);
    let b = lines("b", 1..=10);
    let c = lines("c", 1..=10);
    let add = repo.commit(
        &[("a.txt", Some(&a)), ("b.txt", Some(&b)), ("c.txt", Some(&c))],
        ALICE,
        EPOCH + DAY,
        "add files",
    );

    let a2 = format!("a1\n{}{}", lines("a", 4..=10), lines("n", 1..=5));
    let b2 = format!("{}{}", lines("b", 1..=4), lines("b", 8..=10));
    let c2 = format!("{}cnew\n", lines("c", 2..=10));
    let modify = repo.commit(
        &[
            ("a.txt", Some(&a2)),
            ("b.txt", Some(&b2)),
            ("c.txt", Some(&c2)),
        ],
        BOB,
        EPOCH + 2 * DAY,
        "modify",
    );
    (repo, vec![root, add, modify])
}

#[test]
fn test_ingest_counts_line_changes() {
    let (repo, ids) = three_file_history();
    let scm = repo.provider();
    let store = memory_store("demo");

    let selected = ChangeSelector::new(CommitRange::AllCommits)
        .select(&scm)
        .unwrap();
    assert_eq!(selected.len(), 3);

    let report = CommitIngestor::new(&scm, &store.connector, &store.caches)
        .with_workers(4)
        .ingest(store.project, &selected)
        .unwrap();
    assert_eq!(report.ingested, 3);
    assert_eq!(report.failed, 0);

    let session = store.connector.connect().unwrap();
    let facts = session
        .get_commit_facts(store.project, &ids[2])
        .unwrap()
        .unwrap();
    assert_eq!(facts.facts.lines_added, 6);
    assert_eq!(facts.facts.lines_deleted, 6);
    assert_eq!(facts.facts.lines_modified, 0);
    assert_eq!(facts.facts.changes, 12);
    assert_eq!(facts.facts.files_modified, 3);
    assert_eq!(facts.author_email, "bob@example.com");
    assert_eq!(facts.message.as_deref(), Some("modify"));
    assert_eq!(facts.stability, 1.0);

    // the follow-up rewrites 6 of the 30 lines the add commit wrote
    let added = session
        .get_commit_facts(store.project, &ids[1])
        .unwrap()
        .unwrap();
    assert_eq!(added.facts.files_added, 3);
    assert_eq!(added.facts.lines_added, 30);
    assert!((added.stability - 0.8).abs() < 1e-9);

    let root = session
        .get_commit_facts(store.project, &ids[0])
        .unwrap()
        .unwrap();
    assert_eq!(root.author_id, added.author_id);
    assert_ne!(root.author_id, facts.author_id);
    assert_eq!(root.size, 5);

    // file associations land with the commit row
    let touched: Vec<u64> = facts.files.iter().map(|f| f.path_id).collect();
    assert_eq!(touched.len(), 3);
    assert_eq!(
        session.file_associations(store.project, &ids[2]).unwrap(),
        touched
    );
    assert_eq!(session.file_associations(store.project, &ids[0]).unwrap().len(), 1);
}

#[test]
fn test_branch_filter_reads_membership() {
    let (repo, _) = three_file_history();
    let scm = repo.provider();
    let store = memory_store("demo");

    let selector = ChangeSelector::default().with_filter(CommitFilter::OnlyInMainBranch);
    let selected = selector.select(&scm).unwrap();
    let report = CommitIngestor::new(&scm, &store.connector, &store.caches)
        .with_selector(selector)
        .ingest(store.project, &selected)
        .unwrap();
    assert_eq!(report.ingested, 3);
    assert_eq!(report.filtered, 0);
}

#[test]
fn test_reingest_is_a_no_op() {
    let (repo, _) = three_file_history();
    let scm = repo.provider();
    let store = memory_store("demo");
    let selected = ChangeSelector::default().select(&scm).unwrap();

    let ingestor = CommitIngestor::new(&scm, &store.connector, &store.caches).with_workers(2);
    let first = ingestor.ingest(store.project, &selected).unwrap();
    let second = ingestor.ingest(store.project, &selected).unwrap();

    assert_eq!(first.ingested, 3);
    assert_eq!(second.ingested, 0);
    assert_eq!(second.skipped, 3);

    let sizes = store
        .connector
        .connect()
        .unwrap()
        .commit_sizes(store.project, None)
        .unwrap();
    assert_eq!(sizes.len(), 3);
}

#[test]
fn test_failed_commit_does_not_stop_siblings() {
    let (repo, ids) = three_file_history();
    let store = memory_store("demo");

    let strict = repo.provider_with(ProviderOptions {
        max_files: 2,
        ..ProviderOptions::default()
    });
    let selected = ChangeSelector::default().select(&strict).unwrap();
    let report = CommitIngestor::new(&strict, &store.connector, &store.caches)
        .with_workers(3)
        .ingest(store.project, &selected)
        .unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(report.ingested, 1);
    assert!(report.failed_commits.contains(&ids[1]));
    assert!(report.failed_commits.contains(&ids[2]));

    // a later run with a higher ceiling picks up only what failed
    let relaxed = repo.provider();
    let retry = CommitIngestor::new(&relaxed, &store.connector, &store.caches)
        .ingest(store.project, &selected)
        .unwrap();
    assert_eq!(retry.ingested, 2);
    assert_eq!(retry.skipped, 1);
}

#[test]
fn test_commit_filters_reject_before_insert() {
    let (repo, ids) = three_file_history();
    let scm = repo.provider();
    let store = memory_store("demo");

    let selector = ChangeSelector::new(CommitRange::SingleCommit(ids[2].clone()))
        .with_filter(CommitFilter::OnlyModificationsWithFileTypes(vec![".rs".into()]));
    let selected = selector.select(&scm).unwrap();
    let report = CommitIngestor::new(&scm, &store.connector, &store.caches)
        .with_selector(selector)
        .ingest(store.project, &selected)
        .unwrap();

    assert_eq!(report.filtered, 1);
    assert!(!store
        .connector
        .connect()
        .unwrap()
        .commit_exists(store.project, &ids[2])
        .unwrap());
}
