//! Decoded method bytecode
//!
//! The [list of bytecode instructions][0] is split into two groups, the same way the verifier
//! thinks about them:
//!
//!   - [`Instruction`] for straight-line instructions (the body of the basic blocks)
//!   - [`BranchInstruction`] for instructions that may transfer control somewhere other than the
//!     next instruction (the end of the basic blocks)
//!
//! Decoding (see [`decode_code`]) resolves every relative jump into an absolute offset in the
//! code array, so later passes never have to think about the encoding of a jump.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

mod decode;
mod instruction;

pub use decode::*;
pub use instruction::*;
