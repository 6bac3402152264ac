//! The narrow, immediate-mode-like contract the world and the portal
//! traversal draw against. Implemented by the wgpu engine and by the
//! command [`Recorder`](super::recorder::Recorder).

use glam::{Mat4, Vec2, Vec3};

use crate::error::BackendError;

/// Handle to a compiled, replayable draw list owned by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawListId(pub u32);

/// Handle to a texture owned by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
    TriangleFan,
    TriangleStrip,
}

/// Decoded RGBA8 pixels ready for upload.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

pub trait RenderBackend {
    /// Open a primitive. Vertices emitted until [`end`](Self::end) belong to it.
    fn begin(&mut self, primitive: Primitive);
    /// Normal applied to subsequently emitted vertices.
    fn normal(&mut self, normal: Vec3);
    /// Color applied to subsequently emitted vertices.
    fn color(&mut self, rgba: [f32; 4]);
    fn vertex(&mut self, position: Vec3, uv: Vec2);
    fn end(&mut self);

    /// `None` draws untextured.
    fn bind_texture(&mut self, texture: Option<TextureId>);
    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureId, BackendError>;

    /// Start capturing geometry into a new draw list instead of the frame.
    fn begin_list(&mut self) -> Result<DrawListId, BackendError>;
    fn end_list(&mut self) -> Result<(), BackendError>;
    /// Drop the list being compiled, and any open primitive, without
    /// storing it. A no-op when nothing is being compiled.
    fn abort_list(&mut self);
    /// Replay a compiled list with the current transform.
    fn call_list(&mut self, list: DrawListId);
    fn delete_list(&mut self, list: DrawListId);

    /// Combined model-view-projection for everything drawn after this call.
    fn set_transform(&mut self, transform: Mat4);
    fn set_lighting(&mut self, enabled: bool);
}
