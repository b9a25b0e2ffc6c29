mod types;

pub use types::Settings;
