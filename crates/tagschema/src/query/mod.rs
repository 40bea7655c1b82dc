//! Query-string decoding
//!
//! [`QueryValues`] holds the flat name to values map; [`Decoder`] walks a
//! model and fills it from that map.

pub mod decoder;
pub mod values;

pub use decoder::Decoder;
pub use values::QueryValues;
