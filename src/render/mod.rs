pub mod backend;
pub mod camera;
pub mod engine;
pub mod mesh;
pub mod pipeline;
pub mod portal;
pub mod recorder;
