//! Breadth-first walks over the remote tree.
//!
//! Recents and search both walk the account from the root, listing one
//! folder at a time. A walk stops when the visitor breaks, when the tree is
//! exhausted, or when the optional folder budget is spent.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::ops::ControlFlow;

use dropdocs_remote::{FileEntry, RemoteClient, RemoteEntry, RemoteError};
use tracing::{debug, trace};

/// Recent documents kept by a walk, minus one (see [`RecentFiles`]).
pub const MAX_LAST_MODIFIED: usize = 5;

/// Search stops after this many matches.
pub const MAX_SEARCH_RESULTS: usize = 20;

/// How listings and walks treat the remote tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WalkOptions {
    pub follow_pagination: bool,
    pub folder_budget: Option<usize>,
}

/// List a folder, following continuation cursors when asked to.
pub(crate) async fn list_folder<C>(
    client: &C,
    path: &str,
    follow_pagination: bool,
) -> Result<Vec<RemoteEntry>, RemoteError>
where
    C: RemoteClient + ?Sized,
{
    let mut page = client.list_folder(path).await?;
    let mut entries = std::mem::take(&mut page.entries);
    let mut pages = 1usize;

    while page.has_more {
        let Some(cursor) = page.cursor.take() else {
            break;
        };
        if !follow_pagination {
            debug!("listing of {:?} truncated after the first page", path);
            break;
        }
        page = client.list_folder_continue(&cursor).await?;
        entries.append(&mut page.entries);
        pages += 1;
    }

    trace!("listed {:?}: {} entries in {} pages", path, entries.len(), pages);
    Ok(entries)
}

/// Walk the tree from the root, calling `visit` for every entry.
///
/// Returns the number of folders listed.
pub(crate) async fn walk<C, F>(
    client: &C,
    options: WalkOptions,
    mut visit: F,
) -> Result<usize, RemoteError>
where
    C: RemoteClient + ?Sized,
    F: FnMut(&RemoteEntry) -> ControlFlow<()> + Send,
{
    let mut queue = VecDeque::from([String::new()]);
    let mut listed = 0usize;

    while let Some(folder) = queue.pop_front() {
        if options.folder_budget.is_some_and(|budget| listed >= budget) {
            debug!("walk stopped after {} folders, {} still queued", listed, queue.len() + 1);
            break;
        }
        let entries = list_folder(client, &folder, options.follow_pagination).await?;
        listed += 1;

        for entry in &entries {
            if entry.is_folder() {
                queue.push_back(entry.path().to_string());
            }
            if visit(entry).is_break() {
                trace!("walk stopped by visitor after {} folders", listed);
                return Ok(listed);
            }
        }
    }
    Ok(listed)
}

/// File ordered by modification time, ties broken by path.
#[derive(Debug)]
struct ByModified(FileEntry);

impl PartialEq for ByModified {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ByModified {}

impl PartialOrd for ByModified {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByModified {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .server_modified
            .cmp(&other.0.server_modified)
            .then_with(|| other.0.path.cmp(&self.0.path))
    }
}

/// Bounded selection of the most recently modified files.
///
/// Holds at most `MAX_LAST_MODIFIED + 1` files: the host expects up to five
/// recents and has always been given one more.
#[derive(Debug)]
pub(crate) struct RecentFiles {
    capacity: usize,
    heap: BinaryHeap<Reverse<ByModified>>,
}

impl RecentFiles {
    pub(crate) fn new() -> Self {
        Self::with_capacity(MAX_LAST_MODIFIED + 1)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    /// Offer a file; the oldest one is dropped once over capacity.
    pub(crate) fn offer(&mut self, file: &FileEntry) {
        self.heap.push(Reverse(ByModified(file.clone())));
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    /// Selected files, newest first.
    pub(crate) fn into_newest_first(self) -> Vec<FileEntry> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(ByModified(f))| f)
            .collect()
    }
}

/// Case-insensitive substring matcher for search queries.
#[derive(Debug, Clone)]
pub(crate) struct NameMatcher {
    needle: String,
}

impl NameMatcher {
    pub(crate) fn new(query: &str) -> Self {
        Self {
            needle: query.to_lowercase(),
        }
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        name.to_lowercase().contains(&self.needle)
    }
}
