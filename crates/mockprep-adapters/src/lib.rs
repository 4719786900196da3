//! Runtime adapters for mockprep (settings file, credential storage).

pub mod config;
pub mod keyring;
