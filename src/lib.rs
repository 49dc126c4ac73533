//! Folio: a shared post cache with visibility rules over pluggable storage
//! backends (flat files, Postgres, or memory).

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
