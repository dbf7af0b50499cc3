pub mod error;
pub mod filesystem;
pub mod init;
pub mod judge;
pub mod langs;
pub mod polygon;
pub mod problem;
pub mod sandbox;
pub mod verdict;

pub use error::{Error, Result};
