use super::PrimaryKey;
use thiserror::Error;

/// Failures raised by the object store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Cannot modify the store outside of a write transaction")]
    NotInWriteTransaction,

    #[error("A write transaction is already in progress")]
    AlreadyInWriteTransaction,

    #[error("Object of type '{0}' has no primary key value")]
    MissingPrimaryKey(&'static str),

    #[error("Invalid primary key for '{type_name}': {value}")]
    InvalidPrimaryKey {
        type_name: &'static str,
        value: String,
    },

    #[error("Object of type '{type_name}' with primary key {key} already exists")]
    DuplicatePrimaryKey {
        type_name: &'static str,
        key: PrimaryKey,
    },

    #[error("Primary key of attached '{type_name}' changed from {registered} to {current}")]
    PrimaryKeyChanged {
        type_name: &'static str,
        registered: PrimaryKey,
        current: PrimaryKey,
    },

    #[error("Object of type '{0}' belongs to another store")]
    ForeignObject(&'static str),

    #[error("Object of type '{0}' is not attached to this store")]
    ObjectNotFound(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures raised while mapping JSON into models or back.
#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Invalid JSON for '{type_name}': {json}")]
    InvalidJson { type_name: &'static str, json: String },

    #[error("Primary key of '{type_name}' was not populated during decode")]
    MissingPrimaryKey { type_name: &'static str },

    #[error("Unexpected JSON {found} at '{key}' of '{type_name}', expected {expected}")]
    UnexpectedKind {
        type_name: &'static str,
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<MappingError>,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type MappingResult<T> = std::result::Result<T, MappingError>;

impl MappingError {
    /// Error domain shared by every mapping failure.
    pub const DOMAIN: &'static str = "memomap.mapping";

    pub(crate) fn invalid_json(type_name: &'static str, json: &impl serde::Serialize) -> Self {
        MappingError::InvalidJson {
            type_name,
            json: serde_json::to_string(json).unwrap_or_default(),
        }
    }

    pub(crate) fn at_element(self, index: usize) -> Self {
        MappingError::Element {
            index,
            source: Box::new(self),
        }
    }

    /// Stable numeric code within [`MappingError::DOMAIN`].
    ///
    /// Element failures report the code of the error they wrap.
    pub fn code(&self) -> i32 {
        match self {
            MappingError::InvalidJson { .. } => 1,
            MappingError::MissingPrimaryKey { .. } => 2,
            MappingError::UnexpectedKind { .. } => 3,
            MappingError::Element { source, .. } => source.code(),
            MappingError::Store(_) => 4,
            MappingError::Serialization(_) => 5,
        }
    }

    /// Innermost error, skipping element wrappers.
    pub fn root(&self) -> &MappingError {
        match self {
            MappingError::Element { source, .. } => source.root(),
            other => other,
        }
    }

    /// Path of element indices leading to the innermost error.
    pub fn element_path(&self) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = self;
        while let MappingError::Element { index, source } = current {
            path.push(*index);
            current = source;
        }
        path
    }
}

impl From<serde_json::Error> for MappingError {
    fn from(err: serde_json::Error) -> Self {
        MappingError::Serialization(err.to_string())
    }
}
