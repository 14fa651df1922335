//! Recompute the `StackMapTable` of a method in a JVM class file
//!
//! Class files rewritten by tools that do not understand stack maps (bytecode weavers, hand
//! patching, obfuscators) end up with frames that no longer match the code, and the JVM refuses to
//! load them. This crate re-derives the frames of one method from its bytecode and writes the
//! class back out, leaving everything else byte-for-byte intact.
//!
//! ```no_run
//! use stackmap_rebuild::rebuild::{run, Settings};
//!
//! # fn rebuild_main() -> Result<(), stackmap_rebuild::rebuild::Error> {
//! let mut settings = Settings::new("build/com/acme/Foo.class", "main");
//! settings.output_directory = "out".into();
//! let written = run(&settings)?;
//! assert_eq!(written, std::path::Path::new("out/com/acme/Foo.class"));
//! # Ok(())
//! # }
//! ```

pub mod jvm;
pub mod rebuild;
pub mod util;
