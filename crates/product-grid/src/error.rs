//! Error type shared by the loader and its platform adapters

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    /// The request never produced a response (network failure, aborted fetch, ...)
    #[error("storefront request failed: {0}")]
    Transport(String),

    /// The storefront answered with a non-success status
    #[error("storefront responded with HTTP {status}")]
    Http { status: u16 },

    #[error("failed to decode storefront response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The GraphQL layer rejected the query
    #[error("storefront query failed: {}", .0.join("; "))]
    Graphql(Vec<String>),

    /// The response decoded but is missing data the grid needs
    #[error("malformed storefront response: {0}")]
    Malformed(String),

    /// The platform could not clone the item template
    #[error("failed to instantiate template: {0}")]
    Template(String),

    #[error("invalid grid configuration: {0}")]
    Config(String),

    /// Every settle ticket of a page was dropped before the page became ready
    #[error("page was abandoned before all images settled")]
    SettleAbandoned,
}
