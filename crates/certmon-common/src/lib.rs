pub mod status;
pub mod types;
