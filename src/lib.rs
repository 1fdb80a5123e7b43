//! Search job trees: composable search plans and their execution engine.

pub mod config;
pub mod error;
pub mod execution;
pub mod job;
pub mod permissions;
pub mod printer;
pub mod result;
pub mod sink;
