//! Fixed-function state: descriptors, GL enum translation and cached native state objects.

pub mod cached;
pub mod desc;
pub mod topology;
pub mod translate;

pub use cached::Cached;
pub use desc::*;
pub use topology::{translate_primitive_mode, PrimitiveMode, PrimitiveTopologyTranslation};
