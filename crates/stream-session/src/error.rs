use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown station: {0}")]
    UnknownStation(String),

    #[error("no station selected")]
    NoActiveStation,
}
