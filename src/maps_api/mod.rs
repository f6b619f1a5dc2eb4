pub mod capital_source;
pub mod map_widget;
