pub mod booking;
pub mod error;

pub use booking::*;
pub use error::AppError;
