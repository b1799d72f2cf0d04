use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LbError {
    #[error("invalid instance '{entry}': {reason}")]
    InvalidInstance { entry: String, reason: String },

    #[error("instance has no backends")]
    NoBackends,
}
