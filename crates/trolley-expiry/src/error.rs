//! Error types for cart and session coordination.

/// Error type for expiry coordination operations.
///
/// None of these are fatal to the host. Controllers recover from every
/// variant locally; they are returned so callers can tell what happened.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Adding to a line would exceed the stock available for it.
    #[error("Only {available} units of {product_name} (size {size_id}) are available")]
    StockExceeded {
        product_name: String,
        size_id: u64,
        available: u32,
    },

    /// The product has no variant with the requested size.
    #[error("Product {product_id} has no variant with size {size_id}")]
    UnknownVariant { product_id: u64, size_id: u64 },

    /// The session token could not be decoded into claims.
    #[error("Malformed session token: {0}")]
    MalformedToken(String),

    /// The session token's `exp` claim lies in the past.
    #[error("Session token expired at {exp}")]
    ExpiredToken { exp: i64 },

    /// A cart timestamp was persisted but the cart was empty at startup.
    #[error("Orphaned cart timestamp record: {0}")]
    OrphanedTimestampRecord(i64),

    /// Error from the durable key-value store.
    #[error("Store error: {0}")]
    Store(String),
}

/// Result type for expiry coordination operations.
pub type Result<T> = std::result::Result<T, Error>;
