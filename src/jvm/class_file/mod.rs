//! Binary model of the class file format
//!
//! Everything here can be decoded with [`Deserialize`] and re-encoded with [`Serialize`]. Parts of
//! a class that are not being rewritten (constants, attributes, other methods) are kept in a form
//! that re-encodes to exactly the bytes that were read.

mod attribute;
mod class;
mod constants;
mod field;
mod method;
mod serialize;
mod version;

pub use attribute::*;
pub use class::*;
pub use constants::*;
pub use field::*;
pub use method::*;
pub use serialize::*;
pub use version::*;
