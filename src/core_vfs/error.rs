// Errors raised while mapping a virtual path onto a mount
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("No mount owns path {0}")]
    NotMounted(String),

    #[error("Filesystem mounted at {0} is unavailable")]
    Unavailable(String),
}

impl PathError {
    pub fn to_ftp_response(&self) -> String {
        match self {
            PathError::NotMounted(_) | PathError::Unavailable(_) => {
                "451 Local error in processing.".to_string()
            }
        }
    }
}
