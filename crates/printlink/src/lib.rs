//! Command-line front end for the printer link core

pub mod cli;
pub mod commands;
pub mod prompt;
