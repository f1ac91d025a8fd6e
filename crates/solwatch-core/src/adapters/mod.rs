mod fixture;
mod solana_rpc;

pub use fixture::{raw_descriptor, Fallback, FixtureSource};
pub use solana_rpc::SolanaRpcSource;
