//! Model capability
//!
//! A type takes part in mapping by implementing [`Model`]: it names its
//! primary-key field (if any) and describes its fields once, through a
//! [`FieldMap`] that is driven in every direction (decode, encode, key
//! probing and graph attachment).

mod handle;

pub use handle::{ModelRef, ObjectId};
pub(crate) use handle::Attachment;

use crate::core::key::KeyProbe;
use crate::core::MappingResult;
use crate::mapper::FieldMap;

/// Ordered multi-relation field.
pub type List<T> = Vec<ModelRef<T>>;

/// A persistable type with declared JSON fields.
///
/// # Example
///
/// ```
/// use memomap::{FieldMap, MappingResult, Model};
///
/// #[derive(Debug, Clone, Default)]
/// struct Dog {
///     id: String,
///     name: String,
/// }
///
/// impl Model for Dog {
///     fn primary_key() -> Option<&'static str> {
///         Some("id")
///     }
///
///     fn describe(&mut self, map: &mut FieldMap<'_>) -> MappingResult<()> {
///         map.required("id", &mut self.id)?;
///         map.field("name", &mut self.name)?;
///         Ok(())
///     }
/// }
///
/// assert_eq!(Dog::type_name(), "Dog");
/// ```
pub trait Model: Default + Clone + Send + Sync + 'static {
    /// Name used in diagnostics.
    fn type_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// JSON key of the primary-key field, or `None` when instances have no
    /// identity beyond their handle.
    fn primary_key() -> Option<&'static str> {
        None
    }

    /// Lists every mapped field against `map`.
    ///
    /// Runs once per pass, and a single `map` call decodes each scalar more
    /// than once, so implementations should have no side effects.
    fn describe(&mut self, map: &mut FieldMap<'_>) -> MappingResult<()>;
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Reads the primary-key value off an instance by running a probe pass.
pub(crate) fn probe_primary_key<T: Model>(value: &mut T) -> MappingResult<KeyProbe> {
    let Some(key) = T::primary_key() else {
        return Ok(KeyProbe::Null);
    };
    let mut map = FieldMap::probing(T::type_name(), key);
    value.describe(&mut map)?;
    Ok(map.into_probe())
}
