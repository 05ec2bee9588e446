use crate::{device::Device, dtype::DType};
use std::fmt;

#[derive(Debug)]
pub enum Error {
    DTypeMismatch {
        expected: DType,
        got: DType,
    },
    DeviceMismatch {
        expected: Device,
        got: Device,
    },
    UnsupportedDType,
    UnsupportedBackend {
        function: String,
        backend: &'static str,
    },
    InvalidArgument(String),
    IncompatibleShape(String),
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
        msg: String,
    },
    // function protocol
    TypeMismatch {
        function: String,
        argument: Option<usize>,
        constraint: String,
        actual: String,
    },
    DuplicateRegistration {
        name: String,
    },
    MissingRegistration {
        name: String,
    },
    CosimMismatch {
        function: String,
        position: usize,
        msg: String,
    },
    Numerical {
        function: String,
        msg: String,
    },
    //
    Lock,
    InvalidState(String),
    Internal {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DTypeMismatch { expected, got } => {
                write!(f, "DType mismatch: expected {:?}, got {:?}", expected, got)
            }
            Self::DeviceMismatch { expected, got } => {
                write!(f, "Device mismatch: expected {}, got {}", expected.name(), got.name())
            }
            Self::UnsupportedDType => write!(f, "Unsupported data type"),
            Self::UnsupportedBackend { function, backend } => {
                write!(f, "{} has no {} implementation", function, backend)
            }
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Self::IncompatibleShape(msg) => write!(f, "Incompatible shape: {}", msg),
            Self::ShapeMismatch { expected, got, msg } => {
                write!(f, "Shape mismatch ({}): expected {:?}, got {:?}", msg, expected, got)
            }
            Self::TypeMismatch {
                function,
                argument,
                constraint,
                actual,
            } => match argument {
                Some(index) => write!(
                    f,
                    "Invalid operation is performed in: {} (argument {}): expect {}, actual {}",
                    function, index, constraint, actual
                ),
                None => write!(
                    f,
                    "Invalid operation is performed in: {}: expect {}, actual {}",
                    function, constraint, actual
                ),
            },
            Self::DuplicateRegistration { name } => write!(f, "Hook {} already exists", name),
            Self::MissingRegistration { name } => write!(f, "Hook {} is not registered", name),
            Self::CosimMismatch { function, position, msg } => {
                write!(f, "Cosim mismatch in {} at output {}: {}", function, position, msg)
            }
            Self::Numerical { function, msg } => write!(f, "Numerical error in {}: {}", function, msg),
            Self::Lock => write!(f, "Failed to acquire lock"),
            Self::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for Error {}
