use serde::{Deserialize, Serialize};

/// Execution model of a chain, used to pick the settlement path
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    /// Account-based chains settled through contract calls
    Evm,

    /// Solana-style chains settled through program instructions
    Solana,
}

impl ChainFamily {
    /// Returns the family as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainFamily::Evm => "evm",
            ChainFamily::Solana => "solana",
        }
    }
}

/// Supported blockchain networks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChainId {
    Ethereum,
    Optimism,
    BinanceSmartChain,
    Polygon,
    Base,
    Arbitrum,
    Avalanche,
    Solana,
}

impl ChainId {
    /// All supported networks
    pub const ALL: [ChainId; 8] = [
        ChainId::Ethereum,
        ChainId::Optimism,
        ChainId::BinanceSmartChain,
        ChainId::Polygon,
        ChainId::Base,
        ChainId::Arbitrum,
        ChainId::Avalanche,
        ChainId::Solana,
    ];

    /// Returns chain name
    pub fn name(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "Ethereum",
            ChainId::Optimism => "Optimism",
            ChainId::BinanceSmartChain => "Binance Smart Chain",
            ChainId::Polygon => "Polygon",
            ChainId::Base => "Base",
            ChainId::Arbitrum => "Arbitrum",
            ChainId::Avalanche => "Avalanche",
            ChainId::Solana => "Solana",
        }
    }

    /// Returns the lowercase key used in logs and dependency names
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "ethereum",
            ChainId::Optimism => "optimism",
            ChainId::BinanceSmartChain => "bsc",
            ChainId::Polygon => "polygon",
            ChainId::Base => "base",
            ChainId::Arbitrum => "arbitrum",
            ChainId::Avalanche => "avalanche",
            ChainId::Solana => "solana",
        }
    }

    /// Creates a ChainId from its lowercase key
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ethereum" => Some(ChainId::Ethereum),
            "optimism" => Some(ChainId::Optimism),
            "bsc" => Some(ChainId::BinanceSmartChain),
            "polygon" => Some(ChainId::Polygon),
            "base" => Some(ChainId::Base),
            "arbitrum" => Some(ChainId::Arbitrum),
            "avalanche" => Some(ChainId::Avalanche),
            "solana" => Some(ChainId::Solana),
            _ => None,
        }
    }

    /// Returns native token symbol
    pub fn native_token(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "ETH",
            ChainId::Optimism => "ETH",
            ChainId::BinanceSmartChain => "BNB",
            ChainId::Polygon => "MATIC",
            ChainId::Base => "ETH",
            ChainId::Arbitrum => "ETH",
            ChainId::Avalanche => "AVAX",
            ChainId::Solana => "SOL",
        }
    }

    /// Returns the execution family used for settlement dispatch
    pub fn family(&self) -> ChainFamily {
        match self {
            ChainId::Solana => ChainFamily::Solana,
            _ => ChainFamily::Evm,
        }
    }

    /// Returns typical block time in milliseconds
    pub fn block_time_ms(&self) -> u64 {
        match self {
            ChainId::Ethereum => 12_000,
            ChainId::Optimism => 2_000,
            ChainId::BinanceSmartChain => 3_000,
            ChainId::Polygon => 2_000,
            ChainId::Base => 2_000,
            ChainId::Arbitrum => 1_000,
            ChainId::Avalanche => 2_000,
            ChainId::Solana => 400,
        }
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_key_roundtrip() {
        for chain in ChainId::ALL {
            assert_eq!(ChainId::from_key(chain.as_str()), Some(chain));
        }
        assert_eq!(ChainId::from_key("near"), None);
    }

    #[test]
    fn test_chain_properties() {
        assert_eq!(ChainId::Ethereum.name(), "Ethereum");
        assert_eq!(ChainId::Ethereum.native_token(), "ETH");
        assert_eq!(ChainId::Polygon.native_token(), "MATIC");
        assert_eq!(ChainId::Solana.native_token(), "SOL");
    }

    #[test]
    fn test_family_split() {
        assert_eq!(ChainId::Solana.family(), ChainFamily::Solana);
        for chain in ChainId::ALL {
            if chain != ChainId::Solana {
                assert_eq!(chain.family(), ChainFamily::Evm);
            }
        }
    }

    #[test]
    fn test_block_times() {
        assert_eq!(ChainId::Ethereum.block_time_ms(), 12_000);
        assert_eq!(ChainId::Solana.block_time_ms(), 400);
    }
}
