use thiserror::Error;

use crate::common::entity::SwitchId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("switch {0} is not known to the topology")]
    UnknownSwitch(SwitchId),

    #[error("host '{0}' is not known to the topology")]
    UnknownHost(String),
}
