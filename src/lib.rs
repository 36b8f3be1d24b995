/// prload library - exposes modules for testing and embedding.
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod report;
pub mod runtime;
pub mod workload;
