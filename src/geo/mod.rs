pub mod coordinate;
pub mod great_circle;
