use thiserror::Error;

use crate::alert::{AlertStatus, AlertTransition};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("cannot {action} an alert that is {from}")]
    InvalidTransition {
        from: AlertStatus,
        action: AlertTransition,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
