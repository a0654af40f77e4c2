pub mod grid;
pub mod series;
