pub mod catalog;
pub mod classifier;
pub mod features;
pub mod interaction;
pub mod route_model;
