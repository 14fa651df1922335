//! JVM class files, their bytecode, and the type information the verifier needs
//!
//! The pieces fit together roughly in the order a method gets rewritten:
//!
//!   - [`class_file`] reads and writes the binary class format
//!   - [`code`] decodes the code array of a method into instructions
//!   - [`class_graph`] answers subtyping questions about the classes mentioned in the code
//!   - [`verifier`] infers the frame at every instruction and compresses the ones that matter
//!     into a [`class_file::StackMapTable`]

mod access_flags;
pub mod class_file;
pub mod class_graph;
pub mod code;
mod descriptors;
mod errors;
mod names;
pub mod verifier;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
