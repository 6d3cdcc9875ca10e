use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A stream event is not valid JSON for the provider's event type.
    #[error("Failed to decode {provider} stream event: {source}")]
    EventDecode {
        provider: &'static str,
        #[source]
        source: sonic_rs::Error,
    },

    /// A non-streamed response body is not valid JSON for the provider's response type.
    #[error("Failed to decode {provider} response: {source}")]
    ResponseDecode {
        provider: &'static str,
        #[source]
        source: sonic_rs::Error,
    },

    /// The conversation cannot be expressed as a request for the provider.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
