use thiserror::Error;
use zbus::Error as ZbusError;

#[derive(Error, Debug)]
pub enum App {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("JSON serialization failed")]
    Json(#[from] serde_json::Error),
    #[error("Zbus error")]
    Zbus(#[from] ZbusError),
}
