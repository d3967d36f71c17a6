pub mod affiliation;
pub mod analysis;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod directory;
pub mod domain;
pub mod error;
pub mod institutions;
pub mod merge;
pub mod output;
pub mod providers;
pub mod record;
pub mod store;
pub mod zenodo;
