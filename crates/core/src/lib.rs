pub mod cache;
pub mod domain;
pub mod oracle;
pub mod registry;
pub mod resilience;
pub mod router;
pub mod settlement;

pub use domain::{ChainFamily, ChainId, Pool, PoolId, ProtocolVersion, Token, TokenId};
pub use oracle::{GasOracle, GasPriority, GasQuote, NativePriceOracle, SettlementSubmitter};
pub use registry::{PoolDiscovery, PoolRegistry};
pub use resilience::{Resilience, ResilienceConfig};
pub use router::{OptimizedRoute, RouteDiscovery, RouteOptimizer, RouteQuery, RouterConfig};
pub use settlement::{CollectorConfig, FeeCollectionRecord, FeeCollector, SettlementBatch};

use std::time::Duration;

/// Core result type for aggregator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a dependency failure, attached where the failure is
/// first observed. Retry decisions match on this, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport-level failure reaching the dependency
    Network,

    /// The call exceeded its deadline
    Timeout,

    /// The dependency rejected the call rate
    RateLimited,

    /// The dependency is up but refusing work
    Unavailable,

    /// Missing or rejected credentials
    Unauthorized,

    /// The request itself is malformed
    MalformedInput,

    /// The settlement account cannot cover the transaction
    InsufficientFunds,

    /// The transaction nonce has already been consumed
    StaleNonce,

    /// The gas price bid is below the network floor
    UnderpricedGas,

    /// The transaction executed and reverted
    Execution,

    /// Unclassified internal failure
    Internal,
}

impl ErrorKind {
    /// Whether the retry loop may attempt the call again
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ErrorKind::Unauthorized
                | ErrorKind::MalformedInput
                | ErrorKind::InsufficientFunds
                | ErrorKind::StaleNonce
                | ErrorKind::UnderpricedGas
        )
    }

    /// Returns the kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::MalformedInput => "malformed-input",
            ErrorKind::InsufficientFunds => "insufficient-funds",
            ErrorKind::StaleNonce => "stale-nonce",
            ErrorKind::UnderpricedGas => "underpriced-gas",
            ErrorKind::Execution => "execution",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Dependency '{dependency}' failed ({kind}): {message}")]
    Dependency {
        dependency: String,
        kind: ErrorKind,
        message: String,
    },

    #[error("Circuit open for '{dependency}', retry after {retry_after:?}")]
    CircuitOpen {
        dependency: String,
        retry_after: Duration,
    },

    #[error("'{operation}' via '{dependency}' failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        dependency: String,
        attempts: u32,
        source: Box<Error>,
    },

    #[error("Settlement failed: {0}")]
    SettlementFailed(String),
}

impl Error {
    /// Creates a classified dependency error
    pub fn dependency(
        dependency: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Error::Dependency {
            dependency: dependency.into(),
            kind,
            message: message.into(),
        }
    }

    /// Returns the failure classification, if this is a dependency error
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Dependency { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the retry loop may attempt the failed call again
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Dependency { kind, .. } => kind.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::Unauthorized.is_retryable());
        assert!(!ErrorKind::MalformedInput.is_retryable());
        assert!(!ErrorKind::InsufficientFunds.is_retryable());
        assert!(!ErrorKind::StaleNonce.is_retryable());
        assert!(!ErrorKind::UnderpricedGas.is_retryable());
    }

    #[test]
    fn test_error_retryability_follows_kind() {
        let transient = Error::dependency("gas-oracle:ethereum", ErrorKind::Network, "conn reset");
        assert!(transient.is_retryable());
        assert_eq!(transient.kind(), Some(ErrorKind::Network));

        let rejected = Error::dependency("settlement:evm", ErrorKind::StaleNonce, "nonce too low");
        assert!(!rejected.is_retryable());

        let validation = Error::InvalidRequest("same token on both sides".into());
        assert!(!validation.is_retryable());
        assert_eq!(validation.kind(), None);
    }

    #[test]
    fn test_exhaustion_preserves_source() {
        let source = Error::dependency("price-oracle:base", ErrorKind::Timeout, "deadline");
        let wrapped = Error::RetriesExhausted {
            operation: "native_price_usd".into(),
            dependency: "price-oracle:base".into(),
            attempts: 4,
            source: Box::new(source),
        };
        let text = wrapped.to_string();
        assert!(text.contains("native_price_usd"));
        assert!(text.contains("4 attempts"));
        assert!(text.contains("deadline"));
    }
}
