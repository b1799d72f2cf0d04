use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("{layer} truncated: need {needed} bytes, have {have}")]
    Truncated {
        layer: &'static str,
        needed: usize,
        have: usize,
    },

    #[error("unsupported {layer}: {detail}")]
    Unsupported {
        layer: &'static str,
        detail: String,
    },
}
