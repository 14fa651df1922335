use super::BinaryName;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// Bytes do not form a well-formed class file
    ClassFormat(ClassFormatError),

    BadDescriptor(String),
    BadName(String),

    /// Method code could not be decoded into instructions
    Decode { offset: u32, kind: DecodeErrorKind },

    /// Instruction that cannot appear in a method with a stack map table (`jsr`, `ret`)
    UnsupportedInstruction { offset: u32, opcode: u8 },

    /// Instruction is not valid in the frame that reaches it
    VerifierError {
        offset: u32,
        instruction: String,
        kind: VerifierErrorKind,
    },

    /// Two paths reach the same offset with operand stacks that cannot be merged
    IncompatibleFrames {
        offset: u32,
        existing_stack: Vec<String>,
        incoming_stack: Vec<String>,
    },

    /// Merging frames at `offset` needs the superclasses of a class that could not be found
    UnknownClass { offset: u32, class: BinaryName },

    /// Constant pool has no room for another entry
    ConstantPoolOverflow { offset: usize },
}

#[derive(Debug)]
pub enum ClassFormatError {
    /// Input ended in the middle of a structure
    Truncated,
    BadMagic(u32),
    UnknownConstantTag { index: u16, tag: u8 },
    BadConstantIndex { index: u16, expected: &'static str },
    BadModifiedUtf8 { index: u16 },
    UnknownHandleKind(u8),
    UnknownFrameType(u8),
    UnknownVerificationTag(u8),

    /// Attribute body was not consumed exactly by its decoder
    BadAttributeLength {
        name: &'static str,
        declared: usize,
        consumed: usize,
    },

    /// Bytes left over after the last attribute of the class
    TrailingBytes(usize),

    Io(std::io::Error),
}

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeErrorKind {
    EmptyCode,
    Truncated,
    UnknownOpcode(u8),
    BadWideOpcode(u8),
    BadArrayType(u8),
    BadSwitchRange { low: i32, high: i32 },
    BadBranchTarget(i64),
}

#[derive(Debug, PartialEq, Eq)]
pub enum VerifierErrorKind {
    EmptyStack,
    InvalidWidth(usize),
    NotArrayType,
    InvalidIndex(u16),
    InvalidType,
    BadConstant(u16),
    BadDescriptor(String),
    FallsOffEnd,
}

impl From<std::io::Error> for ClassFormatError {
    fn from(err: std::io::Error) -> ClassFormatError {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ClassFormatError::Truncated
        } else {
            ClassFormatError::Io(err)
        }
    }
}

impl From<ClassFormatError> for Error {
    fn from(err: ClassFormatError) -> Error {
        Error::ClassFormat(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "{}", err),
            Error::ClassFormat(err) => write!(f, "malformed class file: {:?}", err),
            Error::BadDescriptor(msg) => write!(f, "bad descriptor: {}", msg),
            Error::BadName(msg) => write!(f, "bad name: {}", msg),
            Error::Decode { offset, kind } => {
                write!(f, "cannot decode bytecode at offset {}: {:?}", offset, kind)
            }
            Error::UnsupportedInstruction { offset, opcode } => write!(
                f,
                "unsupported instruction (opcode {:#04x}) at offset {}",
                opcode, offset
            ),
            Error::VerifierError {
                offset,
                instruction,
                kind,
            } => write!(
                f,
                "type error at offset {} ({}): {:?}",
                offset, instruction, kind
            ),
            Error::IncompatibleFrames {
                offset,
                existing_stack,
                incoming_stack,
            } => write!(
                f,
                "incompatible stacks at offset {}: {:?} and {:?}",
                offset, existing_stack, incoming_stack
            ),
            Error::UnknownClass { offset, class } => write!(
                f,
                "cannot merge frames at offset {}: class {} is not on the class path",
                offset, class
            ),
            Error::ConstantPoolOverflow { offset } => {
                write!(f, "constant pool overflow at index {}", offset)
            }
        }
    }
}
