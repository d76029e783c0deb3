//! Type definitions

pub mod trip;
pub mod user;

pub use trip::*;
pub use user::*;
