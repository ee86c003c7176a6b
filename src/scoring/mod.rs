pub mod genre;
pub mod mood;
