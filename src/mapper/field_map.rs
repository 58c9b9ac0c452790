//! Mapping context handed to [`Model::describe`].
//!
//! One `describe` implementation serves every pass. Field methods branch on
//! the active pass:
//!
//! | pass   | absent key | `null`          | expected kind      | other kind |
//! |--------|------------|-----------------|--------------------|------------|
//! | decode | untouched  | cleared / `None`| assigned / upserted| ignored    |
//!
//! Encoding writes every field; relations embed the related object (with its
//! primary key) or `null`, lists always encode as arrays.

use super::transform::Transform;
use super::Mapper;
use crate::core::key::KeyProbe;
use crate::core::{MappingError, MappingResult, PrimaryKey};
use crate::model::{List, Model, ModelRef};
use crate::store::Store;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{event, Level};

/// JSON object as seen by the mapper.
pub type JsonObject = Map<String, JsonValue>;

/// Which way values flow through a [`FieldMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    FromJson,
    ToJson,
}

static PROBE_MAPPER: Mapper = Mapper::new();

enum Pass<'a> {
    /// JSON → model. Without a store, relations decode into transient handles.
    /// A shallow decode reads scalars only.
    Decode {
        json: &'a JsonObject,
        store: Option<&'a mut Store>,
        shallow: bool,
    },
    /// Model → JSON.
    Encode { out: JsonObject },
    /// Reads a single field's JSON value.
    Probe { key: &'a str, found: KeyProbe },
    /// Attaches every related instance to the store.
    Attach { store: &'a mut Store, update: bool },
}

pub struct FieldMap<'a> {
    type_name: &'static str,
    mapper: &'a Mapper,
    pass: Pass<'a>,
}

impl<'a> FieldMap<'a> {
    pub(crate) fn decoding(
        type_name: &'static str,
        mapper: &'a Mapper,
        json: &'a JsonObject,
        store: Option<&'a mut Store>,
    ) -> Self {
        Self {
            type_name,
            mapper,
            pass: Pass::Decode {
                json,
                store,
                shallow: false,
            },
        }
    }

    /// Skip relation and list fields while decoding.
    pub(crate) fn scalars_only(mut self) -> Self {
        if let Pass::Decode { shallow, .. } = &mut self.pass {
            *shallow = true;
        }
        self
    }

    pub(crate) fn encoding(type_name: &'static str, mapper: &'a Mapper) -> Self {
        Self {
            type_name,
            mapper,
            pass: Pass::Encode { out: JsonObject::new() },
        }
    }

    pub(crate) fn probing(type_name: &'static str, key: &'a str) -> Self {
        Self {
            type_name,
            mapper: &PROBE_MAPPER,
            pass: Pass::Probe {
                key,
                found: KeyProbe::Null,
            },
        }
    }

    pub(crate) fn attaching(
        type_name: &'static str,
        mapper: &'a Mapper,
        store: &'a mut Store,
        update: bool,
    ) -> Self {
        Self {
            type_name,
            mapper,
            pass: Pass::Attach { store, update },
        }
    }

    pub(crate) fn into_json(self) -> JsonObject {
        match self.pass {
            Pass::Encode { out } => out,
            _ => JsonObject::new(),
        }
    }

    pub(crate) fn into_probe(self) -> KeyProbe {
        match self.pass {
            Pass::Probe { found, .. } => found,
            _ => KeyProbe::Null,
        }
    }

    /// Name of the model being described.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn direction(&self) -> Direction {
        match self.pass {
            Pass::Decode { .. } => Direction::FromJson,
            _ => Direction::ToJson,
        }
    }

    /// Raw JSON under `key` while decoding; `None` in every other pass.
    pub fn current_value(&self, key: &str) -> Option<&'a JsonValue> {
        self.source().and_then(|json| json.get(key))
    }

    fn source(&self) -> Option<&'a JsonObject> {
        match &self.pass {
            Pass::Decode { json, .. } => Some(*json),
            _ => None,
        }
    }

    // ========================================================================
    // Scalars
    // ========================================================================

    /// Optional scalar field.
    pub fn field<V>(&mut self, key: &str, value: &mut V) -> MappingResult<()>
    where
        V: Serialize + DeserializeOwned,
    {
        if let Some(json) = self.source() {
            if let Some(raw) = json.get(key) {
                match V::deserialize(raw) {
                    Ok(decoded) => *value = decoded,
                    Err(_) => self.unexpected(key, raw, std::any::type_name::<V>())?,
                }
            }
            return Ok(());
        }
        self.emit(key, || serde_json::to_value(&*value))
    }

    /// Scalar field the JSON must provide; anything else rejects the document.
    pub fn required<V>(&mut self, key: &str, value: &mut V) -> MappingResult<()>
    where
        V: Serialize + DeserializeOwned,
    {
        if let Some(json) = self.source() {
            match json.get(key).and_then(|raw| V::deserialize(raw).ok()) {
                Some(decoded) => *value = decoded,
                None => return Err(MappingError::invalid_json(self.type_name, json)),
            }
            return Ok(());
        }
        self.emit(key, || serde_json::to_value(&*value))
    }

    /// Scalar field converted through a custom [`Transform`].
    pub fn field_with<V, X>(&mut self, key: &str, value: &mut V, transform: &X) -> MappingResult<()>
    where
        X: Transform<Value = V>,
    {
        if let Some(json) = self.source() {
            if let Some(raw) = json.get(key) {
                match transform.from_json(raw) {
                    Some(decoded) => *value = decoded,
                    None => self.unexpected(key, raw, std::any::type_name::<V>())?,
                }
            }
            return Ok(());
        }
        self.emit(key, || Ok(transform.to_json(&*value)))
    }

    fn emit<F>(&mut self, key: &str, make: F) -> MappingResult<()>
    where
        F: FnOnce() -> Result<JsonValue, serde_json::Error>,
    {
        match &mut self.pass {
            Pass::Encode { out } => {
                out.insert(key.to_string(), make()?);
            }
            Pass::Probe { key: wanted, found } if *wanted == key => {
                *found = PrimaryKey::probe(Some(&make()?));
            }
            _ => {}
        }
        Ok(())
    }

    // ========================================================================
    // Relations
    // ========================================================================

    /// Single relation to another model.
    pub fn relation<R: Model>(&mut self, key: &str, value: &mut Option<ModelRef<R>>) -> MappingResult<()> {
        let type_name = self.type_name;
        let mapper = self.mapper;

        match &mut self.pass {
            Pass::Decode { shallow: true, .. } => {}
            Pass::Decode { json, store, .. } => {
                let json: &'a JsonObject = *json;
                let Some(raw) = json.get(key) else {
                    return Ok(());
                };
                match raw {
                    JsonValue::Null => *value = None,
                    JsonValue::Object(object) => {
                        let related = match store {
                            Some(store) => mapper.upsert_validated::<R>(&mut **store, object)?,
                            None => ModelRef::new(mapper.decode::<R>(object)?),
                        };
                        *value = Some(related);
                    }
                    other => unexpected(mapper, type_name, key, other, "object")?,
                }
            }
            Pass::Encode { out } => {
                let encoded = match value {
                    Some(related) => JsonValue::Object(mapper.to_json(related)?),
                    None => JsonValue::Null,
                };
                out.insert(key.to_string(), encoded);
            }
            Pass::Attach { store, update } => {
                if let Some(related) = value.clone() {
                    *value = Some(mapper.attach(&mut **store, related, *update)?);
                }
            }
            Pass::Probe { .. } => {}
        }
        Ok(())
    }

    /// Ordered multi-relation to another model.
    ///
    /// A decoded array replaces the list; the new contents are collected in
    /// full before the field is touched.
    pub fn list<R: Model>(&mut self, key: &str, value: &mut List<R>) -> MappingResult<()> {
        let type_name = self.type_name;
        let mapper = self.mapper;

        match &mut self.pass {
            Pass::Decode { shallow: true, .. } => {}
            Pass::Decode { json, store, .. } => {
                let json: &'a JsonObject = *json;
                let Some(raw) = json.get(key) else {
                    return Ok(());
                };
                match raw {
                    JsonValue::Null => value.clear(),
                    JsonValue::Array(items) => {
                        let buffer = match store {
                            Some(store) => mapper.upsert_validated_array::<R>(&mut **store, items)?,
                            None => mapper.decode_array::<R>(items)?,
                        };
                        *value = buffer;
                    }
                    other => unexpected(mapper, type_name, key, other, "array")?,
                }
            }
            Pass::Encode { out } => {
                out.insert(
                    key.to_string(),
                    JsonValue::Array(mapper.to_json_array(value)?),
                );
            }
            Pass::Attach { store, update } => {
                let mut attached = Vec::with_capacity(value.len());
                for related in value.iter() {
                    attached.push(mapper.attach(&mut **store, related.clone(), *update)?);
                }
                *value = attached;
            }
            Pass::Probe { .. } => {}
        }
        Ok(())
    }

    fn unexpected(&self, key: &str, found: &JsonValue, expected: &'static str) -> MappingResult<()> {
        unexpected(self.mapper, self.type_name, key, found, expected)
    }
}

/// Lenient by default: wrong JSON kinds are logged and skipped.
fn unexpected(
    mapper: &Mapper,
    type_name: &'static str,
    key: &str,
    found: &JsonValue,
    expected: &'static str,
) -> MappingResult<()> {
    if mapper.config().strict_kinds {
        return Err(MappingError::UnexpectedKind {
            type_name,
            key: key.to_string(),
            expected,
            found: kind_name(found),
        });
    }
    event!(
        Level::DEBUG,
        model = type_name,
        key,
        found = kind_name(found),
        expected,
        "ignoring unexpected JSON value"
    );
    Ok(())
}

fn kind_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
