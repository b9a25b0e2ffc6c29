pub mod location;
mod reconcile;
mod types;

pub use reconcile::{load, load_if_exists, persist_bundle, rotate_token, Persisted};
pub use types::KubeConfig;
