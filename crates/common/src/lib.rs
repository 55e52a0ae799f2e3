pub mod category;
pub mod config;
pub mod error;

pub use category::{Category, PerCategory};
pub use config::*;
pub use error::{MalblockError, MalblockResult};
