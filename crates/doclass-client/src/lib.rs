//! Client side of a deployed classifier: posts documents to the gateway.

#[cfg(feature = "http")]
pub mod gateway;

#[cfg(feature = "http")]
pub use gateway::{GatewayClient, GatewayError, decode_response};
