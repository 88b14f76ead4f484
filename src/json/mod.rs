//! JSON document model
//!
//! A compact, reference-counted JSON tree backed by a per-thread slab
//! allocator. Values are pointer-sized, copies share the tree through an
//! atomic count, and serialization writes straight into an append buffer.
//!
//! ```text
//! Value ──→ Mem { type, refn, payload }
//!             ├─ Int / Bool / Double        inline
//!             ├─ String                     slab block, tag at −8, len at −4
//!             └─ Array / Object             word buffer (1 or 2 words/entry)
//! ```

mod parse;
mod ser;
pub mod slab;
mod value;

pub use slab::SlabStats;
pub use value::{Entries, Kind, Value};
