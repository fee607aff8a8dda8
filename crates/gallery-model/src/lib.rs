pub mod config;
pub mod outcome;
pub mod painting;

pub use config::*;
pub use outcome::*;
pub use painting::*;
