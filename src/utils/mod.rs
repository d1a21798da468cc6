pub mod error;
pub mod url;

pub use error::{AppError, Result};
