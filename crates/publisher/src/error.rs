//! Publisher lifecycle errors

use contracts::{ContractError, EncodeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("publisher already started")]
    AlreadyStarted,

    #[error("publisher already stopped")]
    Stopped,

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] ContractError),
}
