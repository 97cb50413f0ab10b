pub mod chains;
pub mod pools;
pub mod tokens;

pub use chains::{ChainFamily, ChainId};
pub use pools::{Pool, PoolId, ProtocolVersion};
pub use tokens::{Token, TokenId};
