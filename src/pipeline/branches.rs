//! Branch membership of ingested commits

use crate::error::MineResult;
use crate::git::ScmProvider;
use crate::store::StoreConnector;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub struct BranchIndexer<'a> {
    scm: &'a dyn ScmProvider,
    connector: &'a dyn StoreConnector,
}

impl<'a> BranchIndexer<'a> {
    pub fn new(scm: &'a dyn ScmProvider, connector: &'a dyn StoreConnector) -> Self {
        Self { scm, connector }
    }

    /// Record, per local branch, the ingested commits it contains.
    ///
    /// Returns branch name -> number of indexed commits. A branch that cannot
    /// be walked is logged and left out.
    pub fn index_branches(&self, project: u64) -> MineResult<BTreeMap<String, usize>> {
        let session = self.connector.connect()?;
        let mut indexed = BTreeMap::new();
        for branch in self.scm.list_branches()? {
            let commits = match self.scm.branch_commits(&branch) {
                Ok(commits) => commits,
                Err(e) => {
                    warn!("Failed to walk branch {}: {}", branch, e);
                    continue;
                }
            };
            let mut known = Vec::with_capacity(commits.len());
            for id in commits {
                if session.commit_exists(project, &id)? {
                    known.push(id);
                }
            }
            session.insert_branch_commits(project, &branch, &known)?;
            indexed.insert(branch, known.len());
        }
        info!("Indexed {} branches", indexed.len());
        Ok(indexed)
    }
}
