//! Command handlers

pub mod backup;
pub mod compare;
pub mod config;
pub mod copy;
pub mod import;
pub mod layers;
