pub mod provision;
pub mod status;
