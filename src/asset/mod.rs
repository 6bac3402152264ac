pub mod model;
pub mod obj;
pub mod texture;
