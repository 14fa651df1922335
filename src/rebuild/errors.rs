use crate::jvm;
use crate::jvm::class_graph::ClassPathError;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum Error {
    /// Input could not be read, or output could not be written
    Io(std::io::Error),

    Jvm(jvm::Error),

    /// No method with this name (and descriptor, if one was given) in the class
    MethodNotFound {
        name: String,
        descriptor: Option<String>,
    },

    /// Method is `abstract` or `native`
    MethodHasNoCode { name: String, descriptor: String },

    ClassPath(ClassPathError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::Jvm(err)
    }
}

impl From<jvm::ClassFormatError> for Error {
    fn from(err: jvm::ClassFormatError) -> Error {
        Error::Jvm(jvm::Error::ClassFormat(err))
    }
}

impl From<ClassPathError> for Error {
    fn from(err: ClassPathError) -> Error {
        Error::ClassPath(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "{}", err),
            Error::Jvm(err) => write!(f, "{}", err),
            Error::MethodNotFound {
                name,
                descriptor: None,
            } => write!(f, "no method named {}", name),
            Error::MethodNotFound {
                name,
                descriptor: Some(descriptor),
            } => write!(f, "no method {}{}", name, descriptor),
            Error::MethodHasNoCode { name, descriptor } => {
                write!(f, "method {}{} has no code", name, descriptor)
            }
            Error::ClassPath(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::ClassPath(err) => Some(err),
            _ => None,
        }
    }
}
