// ============================================================================
// memomap Library
// ============================================================================
//
// Maps JSON documents onto shared model instances held by an in-memory
// object store, and back. Models with a primary key are upserted: mapping
// the same key twice updates one instance instead of creating two.
//
// ============================================================================

pub mod core;
pub mod mapper;
pub mod model;
pub mod store;

// Re-export main types for convenience
pub use core::{MappingError, MappingResult, PrimaryKey, StoreError, StoreResult};
pub use mapper::{
    Direction, FieldMap, IsoDateTransform, JsonObject, Mapper, MapperConfig, TimestampTransform,
    Transform,
};
pub use model::{List, Model, ModelRef, ObjectId};
pub use store::{Store, StoreConfig};
