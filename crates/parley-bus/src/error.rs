/// Errors that can occur in the bus layer.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The topic is not publishable (empty, or contains a wildcard).
    #[error("invalid topic: {0:?}")]
    InvalidTopic(String),

    /// The subscription filter is malformed (e.g. `#` not in last position).
    #[error("invalid topic filter: {0:?}")]
    InvalidFilter(String),

    /// Another client is already connected with this id.
    #[error("client id {0:?} already connected")]
    ClientIdInUse(String),

    /// The client is no longer connected to the broker.
    #[error("client {0:?} is disconnected")]
    Disconnected(String),
}
