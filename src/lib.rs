// Core infrastructure modules
pub mod config;
pub mod core;

// Feature-specific modules
pub mod backup;
pub mod db;
pub mod export;
pub mod import;
pub mod menu;
pub mod repl;

#[cfg(test)]
pub mod test_utils;
