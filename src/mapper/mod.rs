//! JSON ↔ model mapping
//!
//! # Architecture
//!
//! - `field_map.rs` - mapping context passed to `Model::describe`
//! - `transform.rs` - custom scalar conversions
//!
//! [`Mapper::map`] is the identity-aware path: documents whose primary key is
//! already attached update that instance in place, so repeated imports
//! converge. [`Mapper::import`] is the all-or-nothing path: a complete
//! transient graph is built and then attached wholesale.

mod field_map;
mod transform;

pub use field_map::{Direction, FieldMap, JsonObject};
pub use transform::{IsoDateTransform, TimestampTransform, Transform};

use crate::core::key::KeyProbe;
use crate::core::{MappingError, MappingResult, PrimaryKey, StoreError};
use crate::model::{probe_primary_key, Model, ModelRef};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug_span, event, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    /// Relations and lists are decoded transiently.
    Graph,
    Scalars,
}

/// Configuration for [`Mapper`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Reject JSON values of the wrong kind instead of skipping them
    pub strict_kinds: bool,
}

impl MapperConfig {
    pub const fn new() -> Self {
        Self {
            strict_kinds: false,
        }
    }

    /// Set strict kind checking
    pub fn strict_kinds(mut self, strict: bool) -> Self {
        self.strict_kinds = strict;
        self
    }
}

/// Maps JSON documents onto models attached to a [`Store`].
///
/// Every operation that touches the store must run inside a write
/// transaction; outside one it fails with
/// [`StoreError::NotInWriteTransaction`].
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    config: MapperConfig,
}

impl Mapper {
    pub const fn new() -> Self {
        Self {
            config: MapperConfig::new(),
        }
    }

    pub fn with_config(config: MapperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    // ========================================================================
    // Identity-aware mapping
    // ========================================================================

    /// Map one JSON object onto an attached instance of `T`.
    ///
    /// The whole document is validated on a transient copy first, so a
    /// rejected document leaves the store untouched. When `T` has a primary
    /// key that is already attached, that instance is updated in place and
    /// returned; otherwise the decoded instance is attached.
    pub fn map<T: Model>(&self, store: &mut Store, json: &JsonObject) -> MappingResult<ModelRef<T>> {
        store.ensure_write()?;
        let (candidate, key) = self.decode_candidate::<T>(json, Depth::Graph)?;
        self.upsert(store, json, candidate, key)
    }

    /// [`Mapper::map`] for a document whose graph was already validated by
    /// an enclosing decode. Only the scalars are decoded up front, to find
    /// the primary key.
    pub(crate) fn upsert_validated<T: Model>(
        &self,
        store: &mut Store,
        json: &JsonObject,
    ) -> MappingResult<ModelRef<T>> {
        let (candidate, key) = self.decode_candidate::<T>(json, Depth::Scalars)?;
        self.upsert(store, json, candidate, key)
    }

    pub(crate) fn upsert_validated_array<T: Model>(
        &self,
        store: &mut Store,
        json: &[JsonValue],
    ) -> MappingResult<Vec<ModelRef<T>>> {
        json.iter()
            .enumerate()
            .map(|(index, item)| {
                let mapped = match item {
                    JsonValue::Object(object) => self.upsert_validated::<T>(store, object),
                    other => Err(MappingError::invalid_json(T::type_name(), other)),
                };
                mapped.map_err(|err| err.at_element(index))
            })
            .collect()
    }

    fn upsert<T: Model>(
        &self,
        store: &mut Store,
        json: &JsonObject,
        mut candidate: T,
        key: Option<PrimaryKey>,
    ) -> MappingResult<ModelRef<T>> {
        let span = debug_span!("map", model = T::type_name());
        let _entered = span.enter();

        if let Some(key) = key {
            if let Some(existing) = store.object_for_primary_key::<T>(key.clone()) {
                store.record_update(&existing)?;
                self.decode_into(&mut *existing.write(), json, Some(&mut *store))?;
                event!(Level::DEBUG, key = %key, "updated attached object in place");
                return Ok(existing);
            }
            event!(Level::DEBUG, key = %key, "inserting new object");
        }

        self.decode_into(&mut candidate, json, Some(&mut *store))?;
        Ok(store.add(ModelRef::new(candidate), false)?)
    }

    /// Like [`Mapper::map`], rejecting anything but a JSON object.
    pub fn map_value<T: Model>(&self, store: &mut Store, json: &JsonValue) -> MappingResult<ModelRef<T>> {
        match json {
            JsonValue::Object(object) => self.map(store, object),
            other => Err(MappingError::invalid_json(T::type_name(), other)),
        }
    }

    /// Map each element in order, stopping at the first failure.
    ///
    /// Elements mapped before the failure stay attached; cancel the write
    /// transaction to discard them.
    pub fn map_array<T: Model>(&self, store: &mut Store, json: &[JsonValue]) -> MappingResult<Vec<ModelRef<T>>> {
        store.ensure_write()?;
        let mut objects = Vec::with_capacity(json.len());
        for (index, item) in json.iter().enumerate() {
            let object = self
                .map_value::<T>(store, item)
                .map_err(|err| err.at_element(index))?;
            objects.push(object);
        }
        Ok(objects)
    }

    // ========================================================================
    // All-or-nothing import
    // ========================================================================

    /// Decode a complete transient graph, then attach it.
    ///
    /// With `allow_updates`, instances whose primary key is already attached
    /// are overwritten wholesale; otherwise such a collision fails with
    /// [`StoreError::DuplicatePrimaryKey`].
    pub fn import<T: Model>(
        &self,
        store: &mut Store,
        json: &JsonObject,
        allow_updates: bool,
    ) -> MappingResult<ModelRef<T>> {
        store.ensure_write()?;
        let span = debug_span!("import", model = T::type_name(), allow_updates);
        let _entered = span.enter();

        let candidate = self.decode::<T>(json)?;
        self.attach(store, ModelRef::new(candidate), allow_updates)
    }

    /// Import every element; nothing is attached unless all elements decode.
    pub fn import_array<T: Model>(
        &self,
        store: &mut Store,
        json: &[JsonValue],
        allow_updates: bool,
    ) -> MappingResult<Vec<ModelRef<T>>> {
        store.ensure_write()?;
        let candidates = self.decode_array::<T>(json)?;
        candidates
            .into_iter()
            .enumerate()
            .map(|(index, object)| {
                self.attach(store, object, allow_updates)
                    .map_err(|err| err.at_element(index))
            })
            .collect()
    }

    /// Attach `object` and, first, every instance reachable through its
    /// relations. Relation fields are repointed at the attached instances.
    pub fn attach<T: Model>(&self, store: &mut Store, object: ModelRef<T>, update: bool) -> MappingResult<ModelRef<T>> {
        store.ensure_write()?;
        {
            let mut value = object.write();
            let mut map = FieldMap::attaching(T::type_name(), self, store, update);
            value.describe(&mut map)?;
        }
        Ok(store.add(object, update)?)
    }

    // ========================================================================
    // Transient decoding
    // ========================================================================

    /// Decode a transient instance without touching any store.
    pub fn decode<T: Model>(&self, json: &JsonObject) -> MappingResult<T> {
        Ok(self.decode_candidate::<T>(json, Depth::Graph)?.0)
    }

    pub(crate) fn decode_array<T: Model>(&self, json: &[JsonValue]) -> MappingResult<Vec<ModelRef<T>>> {
        json.iter()
            .enumerate()
            .map(|(index, item)| {
                let decoded = match item {
                    JsonValue::Object(object) => self.decode::<T>(object),
                    other => Err(MappingError::invalid_json(T::type_name(), other)),
                };
                decoded
                    .map(ModelRef::new)
                    .map_err(|err| err.at_element(index))
            })
            .collect()
    }

    fn decode_candidate<T: Model>(&self, json: &JsonObject, depth: Depth) -> MappingResult<(T, Option<PrimaryKey>)> {
        let mut candidate = T::default();
        let mut map = FieldMap::decoding(T::type_name(), self, json, None);
        if depth == Depth::Scalars {
            map = map.scalars_only();
        }
        candidate.describe(&mut map)?;

        // a key field left at its default was never populated
        if let Some(field) = T::primary_key() {
            if json.get(field).is_none_or(JsonValue::is_null) {
                return Err(MappingError::MissingPrimaryKey {
                    type_name: T::type_name(),
                });
            }
        }
        let key = self.checked_key(&mut candidate)?;
        Ok((candidate, key))
    }

    fn decode_into<T: Model>(&self, target: &mut T, json: &JsonObject, store: Option<&mut Store>) -> MappingResult<()> {
        let mut map = FieldMap::decoding(T::type_name(), self, json, store);
        target.describe(&mut map)
    }

    fn checked_key<T: Model>(&self, value: &mut T) -> MappingResult<Option<PrimaryKey>> {
        if T::primary_key().is_none() {
            return Ok(None);
        }
        match probe_primary_key(value)? {
            KeyProbe::Found(key) => Ok(Some(key)),
            KeyProbe::Null => Err(MappingError::MissingPrimaryKey {
                type_name: T::type_name(),
            }),
            KeyProbe::Unsupported(found) => Err(StoreError::InvalidPrimaryKey {
                type_name: T::type_name(),
                value: found.to_string(),
            }
            .into()),
        }
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode an instance, embedding related instances.
    ///
    /// The key an instance was attached under is always written back, so the
    /// output identifies the stored object even if the field drifted or the
    /// type leaves it out of `describe`.
    pub fn to_json<T: Model>(&self, object: &ModelRef<T>) -> MappingResult<JsonObject> {
        let mut snapshot = object.snapshot();
        let mut map = FieldMap::encoding(T::type_name(), self);
        snapshot.describe(&mut map)?;
        let mut json = map.into_json();

        if let (Some(field), Some(key)) = (T::primary_key(), object.registered_key()) {
            json.insert(field.to_string(), key.to_json());
        }
        Ok(json)
    }

    pub fn to_json_array<T: Model>(&self, objects: &[ModelRef<T>]) -> MappingResult<Vec<JsonValue>> {
        objects
            .iter()
            .map(|object| self.to_json(object).map(JsonValue::Object))
            .collect()
    }
}

// ============================================================================
// Store shortcuts using the default mapper
// ============================================================================

impl Store {
    /// Shorthand for [`Mapper::map`].
    pub fn map<T: Model>(&mut self, json: &JsonObject) -> MappingResult<ModelRef<T>> {
        Mapper::new().map(self, json)
    }

    /// Shorthand for [`Mapper::map_array`].
    pub fn map_array<T: Model>(&mut self, json: &[JsonValue]) -> MappingResult<Vec<ModelRef<T>>> {
        Mapper::new().map_array(self, json)
    }

    /// Shorthand for [`Mapper::import`].
    pub fn import<T: Model>(&mut self, json: &JsonObject, allow_updates: bool) -> MappingResult<ModelRef<T>> {
        Mapper::new().import(self, json, allow_updates)
    }

    /// Shorthand for [`Mapper::import_array`].
    pub fn import_array<T: Model>(
        &mut self,
        json: &[JsonValue],
        allow_updates: bool,
    ) -> MappingResult<Vec<ModelRef<T>>> {
        Mapper::new().import_array(self, json, allow_updates)
    }
}
