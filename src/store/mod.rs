//! In-memory object store
//!
//! Holds attached model instances per type, indexes them by primary key and
//! confines every mutation to an explicit write transaction. Cancelling a
//! transaction reverts its changes in reverse order.

mod table;
mod transaction;

use crate::core::key::KeyProbe;
use crate::core::{PrimaryKey, StoreError, StoreResult};
use crate::model::{probe_primary_key, Attachment, Model, ModelRef};
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use table::{AnyTable, Table};
use tracing::{event, Level};
use transaction::{Change, ChangeKind, WriteTransaction};

/// Process-unique store identifier.
pub type StoreId = u64;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name reported in log events
    pub name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// Set the store name
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

/// Object store with identity-aware tables.
///
/// # Examples
///
/// ```
/// use memomap::{FieldMap, MappingResult, Model, ModelRef, Store};
///
/// #[derive(Debug, Clone, Default)]
/// struct Dog {
///     id: String,
/// }
///
/// impl Model for Dog {
///     fn primary_key() -> Option<&'static str> {
///         Some("id")
///     }
///
///     fn describe(&mut self, map: &mut FieldMap<'_>) -> MappingResult<()> {
///         map.required("id", &mut self.id)
///     }
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut store = Store::new();
/// store.begin_write()?;
/// store.add(ModelRef::new(Dog { id: "1".into() }), false)?;
/// store.commit_write()?;
///
/// assert!(store.object_for_primary_key::<Dog>("1").is_some());
/// # Ok(())
/// # }
/// ```
pub struct Store {
    id: StoreId,
    config: StoreConfig,
    tables: HashMap<TypeId, Box<dyn AnyTable>>,
    transaction: Option<WriteTransaction>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::SeqCst),
            config,
            tables: HashMap::new(),
            transaction: None,
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ========================================================================
    // Write transactions
    // ========================================================================

    pub fn is_in_write_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn begin_write(&mut self) -> StoreResult<()> {
        if self.transaction.is_some() {
            return Err(StoreError::AlreadyInWriteTransaction);
        }
        self.transaction = Some(WriteTransaction::new());
        event!(Level::TRACE, store = %self.config.name, "write transaction started");
        Ok(())
    }

    pub fn commit_write(&mut self) -> StoreResult<()> {
        let transaction = self
            .transaction
            .take()
            .ok_or(StoreError::NotInWriteTransaction)?;
        event!(
            Level::TRACE,
            store = %self.config.name,
            changes = transaction.len(),
            elapsed_us = transaction.elapsed_micros() as u64,
            "write transaction committed"
        );
        Ok(())
    }

    /// Abort the write transaction, reverting every recorded change.
    pub fn cancel_write(&mut self) -> StoreResult<()> {
        let transaction = self
            .transaction
            .take()
            .ok_or(StoreError::NotInWriteTransaction)?;
        let changes = transaction.len();
        for change in transaction.into_undo_order() {
            event!(Level::TRACE, kind = %change.kind(), model = change.model(), "reverting change");
            change.revert(self);
        }
        event!(Level::TRACE, store = %self.config.name, changes, "write transaction cancelled");
        Ok(())
    }

    /// Run `f` inside a write transaction.
    ///
    /// Commits when `f` returns `Ok`, cancels when it returns `Err`.
    pub fn write<R, E, F>(&mut self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Store) -> Result<R, E>,
        E: From<StoreError>,
    {
        self.begin_write()?;
        match f(self) {
            Ok(value) => {
                if self.is_in_write_transaction() {
                    self.commit_write()?;
                }
                Ok(value)
            }
            Err(err) => {
                if self.is_in_write_transaction() {
                    self.cancel_write()?;
                }
                Err(err)
            }
        }
    }

    pub(crate) fn ensure_write(&self) -> StoreResult<()> {
        if self.transaction.is_none() {
            return Err(StoreError::NotInWriteTransaction);
        }
        Ok(())
    }

    fn record(&mut self, change: Change) {
        if let Some(transaction) = self.transaction.as_mut() {
            transaction.record(change);
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Attach a single instance.
    ///
    /// Relations are not followed. An instance whose primary key is already
    /// taken fails with [`StoreError::DuplicatePrimaryKey`] unless `update`
    /// is set, in which case its values are copied into the attached
    /// instance and that instance is returned.
    pub fn add<T: Model>(&mut self, object: ModelRef<T>, update: bool) -> StoreResult<ModelRef<T>> {
        self.ensure_write()?;

        if let Some(attachment) = object.attachment() {
            if attachment.store != self.id {
                return Err(StoreError::ForeignObject(T::type_name()));
            }
            if self.table::<T>().is_some_and(|t| t.contains(object.id())) {
                ensure_key_unchanged(&object)?;
                return Ok(object);
            }
        }

        let key = key_of(&object)?;

        if let Some(key) = &key {
            if let Some(existing) = self.table::<T>().and_then(|t| t.get_by_key(key)) {
                if !update {
                    return Err(StoreError::DuplicatePrimaryKey {
                        type_name: T::type_name(),
                        key: key.clone(),
                    });
                }
                let incoming = object.snapshot();
                let previous = std::mem::replace(&mut *existing.write(), incoming);
                let target = existing.clone();
                self.record(Change::new(ChangeKind::Overwrite, T::type_name(), move |_| {
                    *target.write() = previous;
                }));
                event!(Level::DEBUG, model = T::type_name(), key = %key, "overwrote attached object");
                return Ok(existing);
            }
        }

        self.table_mut::<T>().insert(object.clone(), key.clone());
        object.set_attachment(Some(Attachment {
            store: self.id,
            key: key.clone(),
        }));

        let id = object.id();
        self.record(Change::new(ChangeKind::Attach, T::type_name(), move |store| {
            if let Some(removed) = store.table_mut::<T>().remove(id) {
                removed.object.set_attachment(None);
            }
        }));
        match &key {
            Some(key) => event!(Level::TRACE, model = T::type_name(), key = %key, "attached object"),
            None => event!(Level::TRACE, model = T::type_name(), id = %id, "attached object"),
        }
        Ok(object)
    }

    pub fn add_all<T: Model>(
        &mut self,
        objects: impl IntoIterator<Item = ModelRef<T>>,
        update: bool,
    ) -> StoreResult<Vec<ModelRef<T>>> {
        objects
            .into_iter()
            .map(|object| self.add(object, update))
            .collect()
    }

    /// Snapshot an attached instance so an in-place update can be reverted.
    ///
    /// Fails with [`StoreError::PrimaryKeyChanged`] if the instance's key
    /// field no longer matches the key it was attached under.
    pub fn record_update<T: Model>(&mut self, object: &ModelRef<T>) -> StoreResult<()> {
        self.ensure_write()?;
        ensure_key_unchanged(object)?;
        let previous = object.snapshot();
        let target = object.clone();
        self.record(Change::new(ChangeKind::Update, T::type_name(), move |_| {
            *target.write() = previous;
        }));
        Ok(())
    }

    pub fn delete<T: Model>(&mut self, object: &ModelRef<T>) -> StoreResult<()> {
        self.ensure_write()?;
        match object.attachment() {
            Some(attachment) if attachment.store == self.id => {}
            Some(_) => return Err(StoreError::ForeignObject(T::type_name())),
            None => return Err(StoreError::ObjectNotFound(T::type_name())),
        }

        let removed = self
            .table_mut::<T>()
            .remove(object.id())
            .ok_or(StoreError::ObjectNotFound(T::type_name()))?;
        removed.object.set_attachment(None);

        let store_id = self.id;
        self.record(Change::new(ChangeKind::Delete, T::type_name(), move |store| {
            removed.object.set_attachment(Some(Attachment {
                store: store_id,
                key: removed.key.clone(),
            }));
            store
                .table_mut::<T>()
                .insert_at(removed.seq, removed.object, removed.key);
        }));
        Ok(())
    }

    /// Remove every attached instance of every type.
    pub fn delete_all(&mut self) -> StoreResult<()> {
        self.ensure_write()?;
        let tables = std::mem::take(&mut self.tables);
        for table in tables.values() {
            table.detach_all();
        }

        let store_id = self.id;
        self.record(Change::new(ChangeKind::DeleteAll, "*", move |store| {
            for table in tables.values() {
                table.reattach_all(store_id);
            }
            store.tables = tables;
        }));
        Ok(())
    }

    /// Drop all contents outright. Only allowed outside a write transaction.
    pub fn reset(&mut self) -> StoreResult<()> {
        if self.transaction.is_some() {
            return Err(StoreError::AlreadyInWriteTransaction);
        }
        for table in self.tables.values() {
            table.detach_all();
        }
        self.tables.clear();
        event!(Level::DEBUG, store = %self.config.name, "store reset");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn object_for_primary_key<T: Model>(&self, key: impl Into<PrimaryKey>) -> Option<ModelRef<T>> {
        let key = key.into();
        self.table::<T>().and_then(|t| t.get_by_key(&key))
    }

    /// Attached instances of `T` in attach order.
    pub fn objects<T: Model>(&self) -> Vec<ModelRef<T>> {
        self.table::<T>()
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn filter<T: Model>(&self, predicate: impl Fn(&T) -> bool) -> Vec<ModelRef<T>> {
        self.table::<T>()
            .map(|t| t.iter().filter(|o| predicate(&*o.read())).cloned().collect())
            .unwrap_or_default()
    }

    pub fn count<T: Model>(&self) -> usize {
        self.table::<T>().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(|t| t.len() == 0)
    }

    /// Per-type instance counts, keyed by model type name.
    pub fn stats(&self) -> HashMap<&'static str, usize> {
        self.tables
            .values()
            .map(|t| (t.type_name(), t.len()))
            .collect()
    }

    fn table<T: Model>(&self) -> Option<&Table<T>> {
        self.tables
            .get(&TypeId::of::<T>())
            .and_then(|t| t.as_any().downcast_ref::<Table<T>>())
    }

    fn table_mut<T: Model>(&mut self) -> &mut Table<T> {
        let table = self
            .tables
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Table::<T>::new(T::type_name())) as Box<dyn AnyTable>);
        match table.as_any_mut().downcast_mut::<Table<T>>() {
            Some(table) => table,
            None => unreachable!("table for {} registered under a foreign type", T::type_name()),
        }
    }
}

fn key_of<T: Model>(object: &ModelRef<T>) -> StoreResult<Option<PrimaryKey>> {
    if T::primary_key().is_none() {
        return Ok(None);
    }
    let mut snapshot = object.snapshot();
    let probe = probe_primary_key(&mut snapshot)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    match probe {
        KeyProbe::Found(key) => Ok(Some(key)),
        KeyProbe::Null => Err(StoreError::MissingPrimaryKey(T::type_name())),
        KeyProbe::Unsupported(value) => Err(StoreError::InvalidPrimaryKey {
            type_name: T::type_name(),
            value: value.to_string(),
        }),
    }
}

/// The primary-key index is keyed by the attach-time value; an attached
/// instance must keep it.
fn ensure_key_unchanged<T: Model>(object: &ModelRef<T>) -> StoreResult<()> {
    let Some(registered) = object.registered_key() else {
        return Ok(());
    };
    match key_of(object)? {
        Some(current) if current != registered => Err(StoreError::PrimaryKeyChanged {
            type_name: T::type_name(),
            registered,
            current,
        }),
        _ => Ok(()),
    }
}
