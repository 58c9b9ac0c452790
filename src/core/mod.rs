pub mod error;
pub mod key;

pub use error::{MappingError, MappingResult, StoreError, StoreResult};
pub use key::PrimaryKey;
