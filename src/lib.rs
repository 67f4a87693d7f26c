//! Realstate - operator tooling for the realstate persistence layer
//!
//! This library crate exposes configuration loading for the binary and for
//! integration testing. The persistence layer itself lives in
//! `realstate-db`.

pub mod config;
