pub mod batch;
pub mod builder;
pub mod decode;
pub mod error;
pub mod event;
pub mod filters;
pub mod job;
pub mod logsink;
pub mod naming;
pub mod options;
pub mod process;
pub mod progress;
pub mod runner;
pub mod timespec;
pub mod variant;
