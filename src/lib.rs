//! Tune graph search API - shared modules for the server and the probe CLI.

pub mod backend;
pub mod config;
pub mod errors;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod queries;
pub mod routes;
pub mod safety;
pub mod scoring;
pub mod title_index;
pub mod vocabulary;
