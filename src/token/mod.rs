pub(crate) mod claims;
mod inspect;

pub use claims::TokenClaims;
pub use inspect::inspect;
