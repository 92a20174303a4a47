//! PATRON Core — domain models, repository trait definitions and error
//! types shared across all crates.
//!
//! This crate has no I/O dependencies; storage and service crates build
//! on the traits defined in [`repository`].

pub mod error;
pub mod models;
pub mod repository;
