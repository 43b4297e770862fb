use std::fmt;

#[derive(Debug)]
#[allow(dead_code)]
pub enum ProxyError {
    Config(String),
    Bind(String),
    NoBackend,
    BackendConnect(String),
    Io(std::io::Error),
    Internal(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Config(msg) => write!(f, "config error: {}", msg),
            ProxyError::Bind(msg) => write!(f, "bind error: {}", msg),
            ProxyError::NoBackend => write!(f, "no backend available"),
            ProxyError::BackendConnect(msg) => write!(f, "backend connect error: {}", msg),
            ProxyError::Io(e) => write!(f, "io error: {}", e),
            ProxyError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> Self {
        ProxyError::Io(e)
    }
}
