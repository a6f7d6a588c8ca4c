pub mod median;
pub mod neighborhood;
