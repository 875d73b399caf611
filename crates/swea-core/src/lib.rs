pub mod agent_state;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod io;
pub mod paths;
pub mod project;
pub mod search;

pub use error::{Result, SweaError};
