#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod geo;
pub mod map;
pub mod maps_api;
pub mod routes;
pub mod sync;
pub mod ui;
