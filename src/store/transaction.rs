// ============================================================================
// Write Transaction Change Log
// ============================================================================
//
// Command Pattern: every mutation made inside a write transaction records a
// reversible Change. COMMIT discards the log; CANCEL replays it backwards.
//
// ============================================================================

use super::Store;
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    /// A transient instance became attached
    Attach,
    /// Incoming values replaced an attached instance with the same key
    Overwrite,
    /// An attached instance is about to be updated in place
    Update,
    /// An attached instance was deleted
    Delete,
    /// Every table was cleared
    DeleteAll,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Attach => write!(f, "ATTACH"),
            ChangeKind::Overwrite => write!(f, "OVERWRITE"),
            ChangeKind::Update => write!(f, "UPDATE"),
            ChangeKind::Delete => write!(f, "DELETE"),
            ChangeKind::DeleteAll => write!(f, "DELETE ALL"),
        }
    }
}

type Undo = Box<dyn FnOnce(&mut Store) + Send>;

/// A single reversible change.
pub(crate) struct Change {
    kind: ChangeKind,
    model: &'static str,
    undo: Undo,
}

impl Change {
    pub fn new(
        kind: ChangeKind,
        model: &'static str,
        undo: impl FnOnce(&mut Store) + Send + 'static,
    ) -> Self {
        Self {
            kind,
            model,
            undo: Box::new(undo),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn model(&self) -> &'static str {
        self.model
    }

    pub fn revert(self, store: &mut Store) {
        (self.undo)(store)
    }
}

/// State of the active write transaction.
pub(crate) struct WriteTransaction {
    changes: Vec<Change>,
    started: Instant,
}

impl WriteTransaction {
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn elapsed_micros(&self) -> u128 {
        self.started.elapsed().as_micros()
    }

    /// Changes in the order they must be reverted.
    pub fn into_undo_order(self) -> impl Iterator<Item = Change> {
        self.changes.into_iter().rev()
    }
}
