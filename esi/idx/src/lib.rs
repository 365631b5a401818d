//! Typed index arenas. Entities in an arena are referred to by small `Copy`
//! keys rather than references, which keeps graphs of IR nodes free of
//! lifetimes and reference counting.
mod index_trait;
mod indexed_map;
mod macros;

pub use index_trait::IndexRef;
pub use indexed_map::IndexedMap;
