use std::error;
use std::fmt;

pub type EmulationResult<T> = std::result::Result<T, EmulationError>;

/*
 * ErrorKind
 * classification tag carried by every emulation error. Hosts branch on kind
 * equality, never on the description text. Other is the open slot for
 * instruction handlers reporting failures of their own.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Memory,
    Opcode,
    Program,
    Other(&'static str),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ErrorKind::Memory => write!(f, "MemoryError"),
            ErrorKind::Opcode => write!(f, "OpcodeError"),
            ErrorKind::Program => write!(f, "ProgramError"),
            ErrorKind::Other(kind) => write!(f, "{}", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulationError {
    pub kind: ErrorKind,
    pub description: String,
}

impl EmulationError {
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> EmulationError {
        EmulationError {
            kind,
            description: description.into(),
        }
    }

    pub fn memory(description: impl Into<String>) -> EmulationError {
        EmulationError::new(ErrorKind::Memory, description)
    }

    pub fn opcode(description: impl Into<String>) -> EmulationError {
        EmulationError::new(ErrorKind::Opcode, description)
    }

    pub fn program(description: impl Into<String>) -> EmulationError {
        EmulationError::new(ErrorKind::Program, description)
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for EmulationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

impl error::Error for EmulationError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        None
    }
}
