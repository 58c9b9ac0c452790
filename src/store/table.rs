use crate::core::PrimaryKey;
use crate::model::{Attachment, ModelRef, ObjectId};
use super::StoreId;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};

/// Type-erased view of a [`Table`], so the store can keep one map of tables.
pub(crate) trait AnyTable: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn len(&self) -> usize;
    fn detach_all(&self);
    fn reattach_all(&self, store: StoreId);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Row removed from a table, kept so the removal can be undone.
pub(crate) struct Removed<T> {
    pub seq: u64,
    pub object: ModelRef<T>,
    pub key: Option<PrimaryKey>,
}

/// Attached instances of one model type.
///
/// Rows are ordered by attach sequence; the key index only holds entries for
/// types that declare a primary key.
pub(crate) struct Table<T> {
    type_name: &'static str,
    next_seq: u64,
    rows: BTreeMap<u64, ModelRef<T>>,
    positions: HashMap<ObjectId, u64>,
    keys: HashMap<PrimaryKey, ObjectId>,
}

impl<T> Table<T> {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            next_seq: 0,
            rows: BTreeMap::new(),
            positions: HashMap::new(),
            keys: HashMap::new(),
        }
    }

    pub fn insert(&mut self, object: ModelRef<T>, key: Option<PrimaryKey>) -> u64 {
        let seq = self.next_seq;
        self.insert_at(seq, object, key);
        seq
    }

    pub fn insert_at(&mut self, seq: u64, object: ModelRef<T>, key: Option<PrimaryKey>) {
        self.next_seq = self.next_seq.max(seq + 1);
        if let Some(key) = key {
            self.keys.insert(key, object.id());
        }
        self.positions.insert(object.id(), seq);
        self.rows.insert(seq, object);
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<Removed<T>> {
        let seq = self.positions.remove(&id)?;
        let object = self.rows.remove(&seq)?;
        let key = object.registered_key();
        if let Some(key) = &key {
            self.keys.remove(key);
        }
        Some(Removed { seq, object, key })
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn get_by_key(&self, key: &PrimaryKey) -> Option<ModelRef<T>> {
        let id = self.keys.get(key)?;
        let seq = self.positions.get(id)?;
        self.rows.get(seq).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelRef<T>> {
        self.rows.values()
    }
}

impl<T: Send + Sync + 'static> AnyTable for Table<T> {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn detach_all(&self) {
        for object in self.rows.values() {
            object.set_attachment(None);
        }
    }

    fn reattach_all(&self, store: StoreId) {
        let keyed: HashMap<&ObjectId, &PrimaryKey> =
            self.keys.iter().map(|(key, id)| (id, key)).collect();
        for object in self.rows.values() {
            object.set_attachment(Some(Attachment {
                store,
                key: keyed.get(&object.id()).map(|key| (*key).clone()),
            }));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
