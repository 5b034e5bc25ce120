//! # FOSSRadar Core
//!
//! Pure logic for the FOSSRadar catalog: project models, the search index
//! projection, the search/filter/rank engine, similarity scoring, and
//! geographic aggregation.
//!
//! This crate performs no I/O and needs no async runtime. Every function is
//! a deterministic function of its inputs and may be called concurrently.

pub mod index;
pub mod models;
pub mod radar;
pub mod search;
pub mod similar;
