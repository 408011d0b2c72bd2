use std::io;

/// Protocol-level status codes returned in reply headers.
///
/// Host errors are translated into one of these at the filesystem mediator
/// boundary; nothing upstream of that boundary ever sees a raw `io::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0,
    AccessDenied = 1,
    NoSuchFileOrDirectory = 2,
    IoError = 3,
    InvalidHandle = 4,
    InvalidSession = 5,
    OutOfResources = 6,
    OperationUnsupported = 7,
    InvalidArgument = 8,
    EndOfFile = 9,
}

impl StatusCode {
    pub fn from_byte(b: u8) -> Option<StatusCode> {
        use StatusCode::*;
        match b {
            0 => Some(Success),
            1 => Some(AccessDenied),
            2 => Some(NoSuchFileOrDirectory),
            3 => Some(IoError),
            4 => Some(InvalidHandle),
            5 => Some(InvalidSession),
            6 => Some(OutOfResources),
            7 => Some(OperationUnsupported),
            8 => Some(InvalidArgument),
            9 => Some(EndOfFile),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        matches!(self, StatusCode::Success)
    }
}

impl From<io::Error> for StatusCode {
    fn from(err: io::Error) -> StatusCode {
        match err.kind() {
            io::ErrorKind::NotFound => StatusCode::NoSuchFileOrDirectory,
            io::ErrorKind::PermissionDenied => StatusCode::AccessDenied,
            io::ErrorKind::UnexpectedEof => StatusCode::EndOfFile,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                StatusCode::InvalidArgument
            }
            _ => StatusCode::IoError,
        }
    }
}

impl From<&io::Error> for StatusCode {
    fn from(err: &io::Error) -> StatusCode {
        StatusCode::from(io::Error::from(err.kind()))
    }
}
