pub mod config;
pub mod error;
pub mod scan;

pub use config::Config;
pub use error::*;
pub use scan::*;
