//! Stack map reconstruction
//!
//! For any specific instruction inside a method body, the stack and locals should have the same
//! structure, regardless of which control flow was used to reach that instruction. In other words:
//! although the values on the stack and in the locals may obviously be different, the types and
//! order of the stack and local variables cannot. This information is referred to as the _stack
//! map frame_ (represented using [`VerifierFrame`] during analysis and [`Frame`] once resolved
//! against a constant pool) and the set of stack map frames for all possible jump targets in a
//! method is the _stack map table_.
//!
//! Knowing the stack map frame at a point in the code makes it possible to verify that the next
//! instruction makes sense (eg. `dadd` only makes sense if the top two elements on the stack are
//! of type `double`). The "types" used in verification (represented using [`VerificationType`])
//! are slightly augmented to take into account initialization and null.
//!
//! Checking straight-line instructions is simple (see [`VerifierFrame::verify_instruction`]), but
//! an instruction reachable from several places needs the frames from all of those places
//! unified. [`Analysis`] does this as a fix-point over basic blocks, and [`rebuild_stack_map`]
//! turns the result into a compressed [`crate::jvm::class_file::StackMapTable`].
//!
//! Reference types are only checked for being references: the classes involved need not be
//! loadable, and the JVM will do the precise assignability checks once the table is in place.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1

mod analysis;
mod frame;
mod stack_map;
mod types;

pub use analysis::*;
pub use frame::*;
pub use stack_map::*;
pub use types::*;
