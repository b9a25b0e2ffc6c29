mod bootstrap;
mod store;

pub use bootstrap::bootstrap;
pub use store::TrustStore;

#[cfg(test)]
pub(crate) use store::tests as test_certs;
