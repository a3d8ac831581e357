use std::fmt;

/// Terminal failure of the capture source. Any of these ends the pass with an empty table.
#[derive(Debug)]
pub enum CaptureError {
    MissingFile(String),
    Spawn(std::io::Error),
    Read(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CaptureError::MissingFile(path) => write!(f, "capture file {path} does not exist"),
            CaptureError::Spawn(e) => write!(f, "unable to spawn tshark: {e}"),
            CaptureError::Read(e) => write!(f, "unable to read packet from tshark: {e}"),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(error: std::io::Error) -> CaptureError {
        CaptureError::Spawn(error)
    }
}

/// Per-packet failure. The packet is dropped and the pass carries on.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    MissingField(&'static str),
    NotNumeric { field: &'static str, value: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::MissingField(field) => write!(f, "missing mandatory field {field}"),
            ParseError::NotNumeric { field, value } => {
                write!(f, "mandatory field {field} is not numeric: {value:?}")
            }
        }
    }
}

impl std::error::Error for ParseError {}
