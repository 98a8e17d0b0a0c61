pub mod flat;
pub mod vector;
