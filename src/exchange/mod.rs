mod client;
pub mod transport;

pub use client::exchange;
