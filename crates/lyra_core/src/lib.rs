pub mod attrs;
pub mod codec;
pub mod error;
pub mod group;
pub mod keys;
pub mod media;
pub mod multi;
pub mod value;

pub use attrs::AttributeStore;
pub use codec::{deserialize, serialize, SerializeMode};
pub use error::{LyraError, LyraResult};
pub use group::GroupSnapshot;
pub use keys::{KeyRegistry, MediaKey};
pub use media::{Media, MediaKind};
pub use value::{parse_float_lenient, parse_int_lenient, Value, ValueType};
