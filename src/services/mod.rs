//! Core services: signature verification, secret storage, fan-out, wallet proxy.

pub mod hub;
pub mod secret;
pub mod verifier;
pub mod wallet;

pub use hub::BroadcastHub;
pub use secret::SecretStore;
pub use wallet::WalletClient;
