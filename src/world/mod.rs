pub mod bake;
pub mod cache;
pub mod sector;
pub mod store;
