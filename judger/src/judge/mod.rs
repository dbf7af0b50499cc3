//! Roles of programs in a judge and the runner tying them together

pub mod checker;
pub mod classic;
mod generator;
pub mod runner;
mod validator;

pub use classic::{Judge, JudgeMessage, JudgeTask};
pub use runner::{RunOptions, Runner};
