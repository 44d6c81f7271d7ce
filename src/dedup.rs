//! Commit deduplication.
//!
//! Given a freshly fetched commit list and the hashes already persisted for
//! a project, keep only the commits not yet processed. Pure function, no
//! side effects; the caller supplies the persisted-hash set.

use std::collections::HashSet;

use crate::models::CommitInfo;

/// Return the fetched commits whose hash is not in `seen`, preserving
/// input order.
///
/// Runs in O(existing + fetched) via set membership — never a nested scan.
pub fn unprocessed(seen: &HashSet<String>, fetched: Vec<CommitInfo>) -> Vec<CommitInfo> {
    fetched
        .into_iter()
        .filter(|c| !seen.contains(&c.hash))
        .collect()
}
