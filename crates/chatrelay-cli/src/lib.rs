#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod logging;
pub mod parser;

pub use logging::init_tracing;
pub use parser::Cli;
