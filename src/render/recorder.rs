//! A backend that records every call instead of drawing. Drives the
//! headless mode and lets tests inspect exactly what was emitted.

use std::collections::BTreeMap;

use glam::{Mat4, Vec2, Vec3};

use super::backend::{DrawListId, Primitive, RenderBackend, TextureId, TextureImage};
use crate::error::BackendError;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Begin(Primitive),
    Normal(Vec3),
    Color([f32; 4]),
    Vertex { position: Vec3, uv: Vec2 },
    End,
    BindTexture(Option<TextureId>),
    CallList(DrawListId),
    SetTransform(Mat4),
    SetLighting(bool),
}

#[derive(Default)]
pub struct Recorder {
    /// Commands issued outside any list, in order.
    pub frame: Vec<Command>,
    /// Compiled lists and their captured commands.
    pub lists: BTreeMap<DrawListId, Vec<Command>>,
    pub textures: Vec<(u32, u32)>,
    pub deleted: Vec<DrawListId>,
    compiling: Option<(DrawListId, Vec<Command>)>,
    next_list: u32,
    max_lists: Option<usize>,
    fail_end_list: bool,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `begin_list` once `max` lists are alive.
    #[cfg(test)]
    pub fn with_list_limit(max: usize) -> Self {
        Self {
            max_lists: Some(max),
            ..Self::default()
        }
    }

    /// Fail the next `end_list` and leave the list open, the way a backend
    /// does when a primitive was never closed.
    #[cfg(test)]
    pub fn with_failing_end_list() -> Self {
        Self {
            fail_end_list: true,
            ..Self::default()
        }
    }

    fn push(&mut self, cmd: Command) {
        match &mut self.compiling {
            Some((_, cmds)) => cmds.push(cmd),
            None => self.frame.push(cmd),
        }
    }

    /// Lists replayed this frame, in submission order.
    #[cfg(test)]
    pub fn calls(&self) -> Vec<DrawListId> {
        self.frame
            .iter()
            .filter_map(|c| match c {
                Command::CallList(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Primitives opened inside one compiled list.
    #[cfg(test)]
    pub fn primitives(&self, list: DrawListId) -> Vec<Primitive> {
        self.lists
            .get(&list)
            .map(|cmds| {
                cmds.iter()
                    .filter_map(|c| match c {
                        Command::Begin(p) => Some(*p),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn clear_frame(&mut self) {
        self.frame.clear();
    }
}

impl RenderBackend for Recorder {
    fn begin(&mut self, primitive: Primitive) {
        self.push(Command::Begin(primitive));
    }

    fn normal(&mut self, normal: Vec3) {
        self.push(Command::Normal(normal));
    }

    fn color(&mut self, rgba: [f32; 4]) {
        self.push(Command::Color(rgba));
    }

    fn vertex(&mut self, position: Vec3, uv: Vec2) {
        self.push(Command::Vertex { position, uv });
    }

    fn end(&mut self) {
        self.push(Command::End);
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.push(Command::BindTexture(texture));
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureId, BackendError> {
        let expected = image.width as usize * image.height as usize * 4;
        if image.rgba.len() != expected {
            return Err(BackendError::Texture(format!(
                "{}x{} image carries {} bytes, expected {expected}",
                image.width,
                image.height,
                image.rgba.len()
            )));
        }
        self.textures.push((image.width, image.height));
        Ok(TextureId(self.textures.len() as u32 - 1))
    }

    fn begin_list(&mut self) -> Result<DrawListId, BackendError> {
        if let Some((id, _)) = &self.compiling {
            return Err(BackendError::NestedList(*id));
        }
        if let Some(max) = self.max_lists {
            if self.lists.len() >= max {
                return Err(BackendError::OutOfLists(max));
            }
        }
        let id = DrawListId(self.next_list);
        self.next_list += 1;
        self.compiling = Some((id, Vec::new()));
        Ok(id)
    }

    fn end_list(&mut self) -> Result<(), BackendError> {
        if std::mem::take(&mut self.fail_end_list) {
            return Err(BackendError::PrimitiveOpen);
        }
        let (id, cmds) = self.compiling.take().ok_or(BackendError::NoActiveList)?;
        self.lists.insert(id, cmds);
        Ok(())
    }

    fn abort_list(&mut self) {
        self.compiling = None;
    }

    fn call_list(&mut self, list: DrawListId) {
        self.push(Command::CallList(list));
    }

    fn delete_list(&mut self, list: DrawListId) {
        if self.lists.remove(&list).is_some() {
            self.deleted.push(list);
        }
    }

    fn set_transform(&mut self, transform: Mat4) {
        self.push(Command::SetTransform(transform));
    }

    fn set_lighting(&mut self, enabled: bool) {
        self.push(Command::SetLighting(enabled));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_capture_is_separate_from_frame() {
        let mut rec = Recorder::new();
        let id = rec.begin_list().unwrap();
        rec.begin(Primitive::Triangles);
        rec.vertex(Vec3::ZERO, Vec2::ZERO);
        rec.end();
        rec.end_list().unwrap();
        rec.call_list(id);

        assert_eq!(rec.frame, vec![Command::CallList(id)]);
        assert_eq!(rec.primitives(id), vec![Primitive::Triangles]);
    }

    #[test]
    fn nested_and_unbalanced_lists_fail() {
        let mut rec = Recorder::new();
        assert!(matches!(rec.end_list(), Err(BackendError::NoActiveList)));
        let id = rec.begin_list().unwrap();
        assert!(matches!(rec.begin_list(), Err(BackendError::NestedList(open)) if open == id));
    }

    #[test]
    fn texture_size_is_checked() {
        let mut rec = Recorder::new();
        let bad = TextureImage { width: 2, height: 2, rgba: vec![0; 3] };
        assert!(rec.create_texture(&bad).is_err());
        let good = TextureImage { width: 1, height: 1, rgba: vec![255; 4] };
        assert_eq!(rec.create_texture(&good).unwrap(), TextureId(0));
    }

    #[test]
    fn aborted_list_frees_the_compiler() {
        let mut rec = Recorder::with_failing_end_list();
        let first = rec.begin_list().unwrap();
        rec.begin(Primitive::Triangles);
        assert!(matches!(rec.end_list(), Err(BackendError::PrimitiveOpen)));
        assert!(matches!(rec.begin_list(), Err(BackendError::NestedList(_))));

        rec.abort_list();
        assert!(!rec.lists.contains_key(&first));
        let second = rec.begin_list().unwrap();
        rec.end_list().unwrap();
        assert!(rec.lists.contains_key(&second));
    }
}
