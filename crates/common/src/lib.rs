// commitcast-common: shared types and errors for the commitcast workspace

pub mod error;
pub mod types;
