use thiserror::Error as ThisError;

use crate::eventemitter::BoxError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(ThisError, Debug)]
pub enum Error {
    /// A listener returned an error while the event was being triggered.
    /// Listeners after it in the same bucket were not invoked.
    #[error("Listener for event '{event}' failed: {source}")]
    Listener {
        event: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Returns the name of the event whose listener failed.
    pub fn event(&self) -> &str {
        match self {
            Self::Listener { event, .. } => event,
        }
    }
}
