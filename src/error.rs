use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("datagram too large: {len} bytes exceeds the {max} byte limit")]
    DatagramTooLarge { len: usize, max: usize },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("send error: {0}")]
    Send(String),

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
