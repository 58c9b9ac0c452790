use crate::core::PrimaryKey;
use crate::store::StoreId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global object ID counter
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj_{}", self.0)
    }
}

/// Where a handle is attached and under which key.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Attachment {
    pub store: StoreId,
    pub key: Option<PrimaryKey>,
}

struct Slot<T> {
    id: ObjectId,
    value: RwLock<T>,
    attachment: Mutex<Option<Attachment>>,
}

/// Shared handle to a model instance.
///
/// Clones share identity: an update applied through one clone is visible
/// through every other. A handle starts out transient and becomes managed
/// once a store attaches it.
pub struct ModelRef<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for ModelRef<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> ModelRef<T> {
    /// Wrap a value in a new transient handle.
    pub fn new(value: T) -> Self {
        Self {
            slot: Arc::new(Slot {
                id: ObjectId::next(),
                value: RwLock::new(value),
                attachment: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.slot.id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.slot.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access to the instance.
    ///
    /// Re-entering `write` on a handle whose guard is still held on the same
    /// thread deadlocks; cyclic relation graphs do exactly that.
    ///
    /// The primary-key field of an attached instance must not be reassigned
    /// through this guard. The store indexes the key the instance was
    /// attached under; re-adding or upserting a drifted instance fails with
    /// `StoreError::PrimaryKeyChanged`, and lookups by the new value miss it.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.slot.value.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ptr_eq(&self, other: &ModelRef<T>) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    pub fn is_managed(&self) -> bool {
        self.attachment().is_some()
    }

    /// Primary key the instance was attached under, if any.
    pub fn registered_key(&self) -> Option<PrimaryKey> {
        self.attachment().and_then(|a| a.key)
    }

    pub(crate) fn attachment(&self) -> Option<Attachment> {
        self.slot
            .attachment
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_attachment(&self, attachment: Option<Attachment>) {
        *self
            .slot
            .attachment
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = attachment;
    }
}

impl<T: Clone> ModelRef<T> {
    /// Copy of the current value.
    pub fn snapshot(&self) -> T {
        self.read().clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for ModelRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRef")
            .field("id", &self.slot.id)
            .field("managed", &self.is_managed())
            .field("value", &*self.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_identity() {
        let a = ModelRef::new(String::from("pluto"));
        let b = a.clone();
        b.write().push_str(" the dog");

        assert!(a.ptr_eq(&b));
        assert_eq!(a.id(), b.id());
        assert_eq!(&*a.read(), "pluto the dog");
    }

    #[test]
    fn test_new_handles_are_transient_and_distinct() {
        let a = ModelRef::new(1);
        let b = ModelRef::new(1);

        assert!(!a.ptr_eq(&b));
        assert_ne!(a.id(), b.id());
        assert!(!a.is_managed());
        assert_eq!(a.registered_key(), None);
    }

    #[test]
    fn test_attachment_records_key() {
        let a = ModelRef::new(());
        a.set_attachment(Some(Attachment {
            store: 9,
            key: Some(PrimaryKey::from("1")),
        }));
        assert!(a.is_managed());
        assert_eq!(a.registered_key(), Some(PrimaryKey::from("1")));

        a.set_attachment(None);
        assert!(!a.is_managed());
    }
}
