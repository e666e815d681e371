pub mod download;
pub mod search;
