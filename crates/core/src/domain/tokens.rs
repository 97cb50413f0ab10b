use serde::{Deserialize, Serialize};

use super::chains::ChainId;

/// Chain-format-agnostic token identifier (hex address, base58 mint, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub String);

impl TokenId {
    /// Creates a new token identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        TokenId(value.to_string())
    }
}

impl From<String> for TokenId {
    fn from(value: String) -> Self {
        TokenId(value)
    }
}

/// Represents a token on a specific chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Token contract address or mint
    pub id: TokenId,

    /// Chain where token exists
    pub chain: ChainId,

    /// Token symbol (e.g., "USDC", "ETH")
    pub symbol: String,

    /// Number of decimals
    pub decimals: u8,
}

impl Token {
    /// Creates a new token
    pub fn new(id: impl Into<TokenId>, chain: ChainId, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            id: id.into(),
            chain,
            symbol: symbol.into(),
            decimals,
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.chain == other.chain
    }
}

impl Eq for Token {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_identity() {
        let usdc = Token::new("0xa0b8...usdc", ChainId::Ethereum, "USDC", 6);
        let same = Token::new("0xa0b8...usdc", ChainId::Ethereum, "USD Coin", 6);
        let bridged = Token::new("0xa0b8...usdc", ChainId::Polygon, "USDC", 6);

        assert_eq!(usdc, same);
        assert_ne!(usdc, bridged);
    }

    #[test]
    fn test_token_id_display() {
        let id = TokenId::new("So11111111111111111111111111111111111111112");
        assert_eq!(id.to_string(), "So11111111111111111111111111111111111111112");
        assert_eq!(id.as_str(), "So11111111111111111111111111111111111111112");
    }
}
