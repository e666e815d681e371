pub mod reaper;
pub mod store;
