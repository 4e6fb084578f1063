#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JitError {
    Verify {
        function: String,
        message: String,
    },
    Exec(String),
    InvalidAccess {
        addr: usize,
        len: usize,
        write: bool,
    },
    UnboundExtern(String),
    CallDepthExceeded {
        limit: usize,
    },
    HelperDepthExceeded {
        limit: usize,
    },
    UnknownStatus(i32),
    Host(String),
    Config(String),
}

impl std::fmt::Display for JitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JitError::Verify { function, message } => {
                write!(f, "verification failed in '{function}': {message}")
            }
            JitError::Exec(message) => write!(f, "execution error: {message}"),
            JitError::InvalidAccess { addr, len, write } => {
                let kind = if *write { "write" } else { "read" };
                write!(f, "invalid {kind} of {len} bytes at {addr:#x}")
            }
            JitError::UnboundExtern(name) => write!(f, "unbound extern '{name}'"),
            JitError::CallDepthExceeded { limit } => {
                write!(f, "call depth limit {limit} exceeded")
            }
            JitError::HelperDepthExceeded { limit } => {
                write!(f, "helper call depth limit {limit} exceeded")
            }
            JitError::UnknownStatus(code) => write!(f, "unknown status code {code}"),
            JitError::Host(message) => write!(f, "host error: {message}"),
            JitError::Config(message) => write!(f, "config error: {message}"),
        }
    }
}

impl std::error::Error for JitError {}

pub type JitResult<T> = Result<T, JitError>;
