mod explain;
mod run;

pub use explain::Explanation;
pub use run::{config, explain, token, version, Connection};
