use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::backend::{DrawListId, Primitive, RenderBackend, TextureId, TextureImage};
use super::mesh::{MeshBuilder, Vertex};
use super::pipeline::{RenderState, Uniforms, MAX_DRAWS};
use crate::error::BackendError;

pub struct GpuState {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub window: Arc<Window>,
}

impl GpuState {
    pub fn new(window: Arc<Window>, vsync: bool) -> Self {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("create surface");

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("request adapter");
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("hero device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            },
        ))
        .expect("request device");

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Self {
            surface,
            device,
            queue,
            config,
            window,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }
}

/// Geometry sharing one texture inside a compiled list.
struct Batch {
    texture: Option<TextureId>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
}

/// Geometry captured between `begin_list` and `end_list`, split by texture.
#[derive(Default)]
struct ListBuilder {
    batches: Vec<(Option<TextureId>, MeshBuilder)>,
}

impl ListBuilder {
    fn mesh_for(&mut self, texture: Option<TextureId>) -> &mut MeshBuilder {
        let idx = match self.batches.iter().position(|(t, _)| *t == texture) {
            Some(idx) => idx,
            None => {
                self.batches.push((texture, MeshBuilder::new()));
                self.batches.len() - 1
            }
        };
        &mut self.batches[idx].1
    }
}

/// One draw recorded this frame, replayed in order by `end_frame`.
#[derive(Clone, Copy, Debug)]
enum DrawCmd {
    List { list: DrawListId, slot: usize },
    Immediate { texture: Option<TextureId>, slot: usize, first: u32, count: u32 },
}

/// Owns all GPU rendering state and implements [`RenderBackend`] on top of
/// wgpu. Created once on window open, used each frame for drawing.
pub struct RenderEngine {
    pub gpu: GpuState,
    pub render: RenderState,
    white: wgpu::BindGroup,
    textures: Vec<wgpu::BindGroup>,
    lists: Vec<Option<Vec<Batch>>>,
    compiling: Option<(DrawListId, ListBuilder)>,

    // immediate-mode state
    primitive: Option<Primitive>,
    pending: Vec<Vertex>,
    normal: Vec3,
    color: [f32; 4],
    texture: Option<TextureId>,

    // per-frame state
    uniforms: Vec<Uniforms>,
    frame_mesh: MeshBuilder,
    commands: Vec<DrawCmd>,
    overflow_logged: bool,
}

impl RenderEngine {
    pub fn new(window: Arc<Window>, vsync: bool) -> Self {
        let gpu = GpuState::new(window, vsync);
        let render = RenderState::new(
            &gpu.device,
            gpu.config.format,
            gpu.config.width,
            gpu.config.height,
        );
        // untextured geometry samples a single white texel
        let white = render.upload_texture(&gpu.device, &gpu.queue, 1, 1, &[255; 4]);

        Self {
            gpu,
            render,
            white,
            textures: Vec::new(),
            lists: Vec::new(),
            compiling: None,
            primitive: None,
            pending: Vec::new(),
            normal: Vec3::Y,
            color: [1.0; 4],
            texture: None,
            uniforms: vec![Uniforms::default()],
            frame_mesh: MeshBuilder::new(),
            commands: Vec::new(),
            overflow_logged: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.gpu.config.width
    }

    pub fn height(&self) -> u32 {
        self.gpu.config.height
    }

    pub fn aspect(&self) -> f32 {
        self.width() as f32 / self.height().max(1) as f32
    }

    pub fn window(&self) -> &Window {
        &self.gpu.window
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        self.render
            .resize_depth(&self.gpu.device, self.gpu.config.width, self.gpu.config.height);
    }

    /// Reset per-frame state. Transform and lighting start from identity/off
    /// until the caller sets them.
    pub fn begin_frame(&mut self) {
        self.uniforms.clear();
        self.uniforms.push(Uniforms::default());
        self.frame_mesh.clear();
        self.commands.clear();
        self.overflow_logged = false;
    }

    fn current_slot(&self) -> usize {
        self.uniforms.len() - 1
    }

    fn push_uniforms(&mut self, edit: impl FnOnce(&mut Uniforms)) -> Result<(), BackendError> {
        push_slot(&mut self.uniforms, MAX_DRAWS, edit)
    }

    fn log_overflow(&mut self, result: Result<(), BackendError>) {
        if let Err(e) = result {
            if !self.overflow_logged {
                log::warn!("{e}");
                self.overflow_logged = true;
            }
        }
    }

    /// Submit everything recorded since `begin_frame` and present.
    pub fn end_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.gpu.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.render.write_uniforms(&self.gpu.queue, &self.uniforms);

        let transient = (!self.frame_mesh.is_empty()).then(|| {
            let vertices = self.gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("frame vertex buffer"),
                contents: bytemuck::cast_slice(&self.frame_mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let indices = self.gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("frame index buffer"),
                contents: bytemuck::cast_slice(&self.frame_mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            (vertices, indices)
        });

        let mut encoder = self.gpu.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor {
                label: Some("render encoder"),
            },
        );

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.render.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.render.pipeline);
            for cmd in &self.commands {
                let offset = RenderState::dynamic_offset(cmd.slot());
                pass.set_bind_group(0, &self.render.uniform_bind_group, &[offset]);
                match *cmd {
                    DrawCmd::List { list, .. } => {
                        let Some(Some(batches)) = self.lists.get(list.0 as usize) else {
                            continue;
                        };
                        for batch in batches {
                            pass.set_bind_group(1, self.texture_group(batch.texture), &[]);
                            pass.set_vertex_buffer(0, batch.vertex_buffer.slice(..));
                            pass.set_index_buffer(
                                batch.index_buffer.slice(..),
                                wgpu::IndexFormat::Uint32,
                            );
                            pass.draw_indexed(0..batch.num_indices, 0, 0..1);
                        }
                    }
                    DrawCmd::Immediate { texture, first, count, .. } => {
                        let Some((vertices, indices)) = &transient else {
                            continue;
                        };
                        pass.set_bind_group(1, self.texture_group(texture), &[]);
                        pass.set_vertex_buffer(0, vertices.slice(..));
                        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                        pass.draw_indexed(first..first + count, 0, 0..1);
                    }
                }
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn texture_group(&self, texture: Option<TextureId>) -> &wgpu::BindGroup {
        texture
            .and_then(|t| self.textures.get(t.0 as usize))
            .unwrap_or(&self.white)
    }

    fn upload_list(&self, builder: ListBuilder) -> Vec<Batch> {
        builder
            .batches
            .into_iter()
            .filter(|(_, mesh)| !mesh.is_empty())
            .map(|(texture, mesh)| Batch {
                texture,
                vertex_buffer: self.gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("list vertex buffer"),
                    contents: bytemuck::cast_slice(&mesh.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                index_buffer: self.gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("list index buffer"),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                num_indices: mesh.indices.len() as u32,
            })
            .collect()
    }
}

impl DrawCmd {
    fn slot(&self) -> usize {
        match *self {
            DrawCmd::List { slot, .. } | DrawCmd::Immediate { slot, .. } => slot,
        }
    }
}

/// Open a new uniform slot derived from the last one. Once `max` slots
/// exist the edit is dropped and every later draw this frame keeps the
/// last slot's transform and lighting.
fn push_slot(
    uniforms: &mut Vec<Uniforms>,
    max: usize,
    edit: impl FnOnce(&mut Uniforms),
) -> Result<(), BackendError> {
    if uniforms.len() >= max {
        return Err(BackendError::TooManyDraws(max));
    }
    let mut next = uniforms.last().copied().unwrap_or_default();
    edit(&mut next);
    uniforms.push(next);
    Ok(())
}

impl RenderBackend for RenderEngine {
    fn begin(&mut self, primitive: Primitive) {
        if self.primitive.is_some() {
            log::warn!("{}", BackendError::PrimitiveOpen);
        }
        self.primitive = Some(primitive);
        self.pending.clear();
    }

    fn normal(&mut self, normal: Vec3) {
        self.normal = normal;
    }

    fn color(&mut self, rgba: [f32; 4]) {
        self.color = rgba;
    }

    fn vertex(&mut self, position: Vec3, uv: Vec2) {
        if self.primitive.is_none() {
            return;
        }
        self.pending.push(Vertex {
            position: position.to_array(),
            normal: self.normal.to_array(),
            uv: uv.to_array(),
            color: self.color,
        });
    }

    fn end(&mut self) {
        let Some(primitive) = self.primitive.take() else {
            return;
        };
        let texture = self.texture;
        let slot = self.current_slot();
        match &mut self.compiling {
            Some((_, builder)) => {
                builder.mesh_for(texture).push(primitive, &self.pending);
            }
            None => {
                let first = self.frame_mesh.indices.len() as u32;
                let added = self.frame_mesh.push(primitive, &self.pending) as u32 * 3;
                if added == 0 {
                    return;
                }
                match self.commands.last_mut() {
                    Some(DrawCmd::Immediate { texture: t, slot: s, count, .. })
                        if *t == texture && *s == slot =>
                    {
                        *count += added;
                    }
                    _ => self.commands.push(DrawCmd::Immediate {
                        texture,
                        slot,
                        first,
                        count: added,
                    }),
                }
            }
        }
        self.pending.clear();
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.texture = texture;
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureId, BackendError> {
        let expected = image.width as usize * image.height as usize * 4;
        if image.width == 0 || image.height == 0 || image.rgba.len() != expected {
            return Err(BackendError::Texture(format!(
                "{}x{} image carries {} bytes, expected {expected}",
                image.width,
                image.height,
                image.rgba.len()
            )));
        }
        let limit = self.gpu.device.limits().max_texture_dimension_2d;
        if image.width > limit || image.height > limit {
            return Err(BackendError::Texture(format!(
                "{}x{} exceeds the device limit of {limit}",
                image.width, image.height
            )));
        }
        let group = self.render.upload_texture(
            &self.gpu.device,
            &self.gpu.queue,
            image.width,
            image.height,
            &image.rgba,
        );
        self.textures.push(group);
        Ok(TextureId(self.textures.len() as u32 - 1))
    }

    fn begin_list(&mut self) -> Result<DrawListId, BackendError> {
        if let Some((id, _)) = &self.compiling {
            return Err(BackendError::NestedList(*id));
        }
        let slot = match self.lists.iter().position(Option::is_none) {
            Some(slot) => slot,
            None => {
                self.lists.push(None);
                self.lists.len() - 1
            }
        };
        let id = DrawListId(slot as u32);
        self.compiling = Some((id, ListBuilder::default()));
        Ok(id)
    }

    fn end_list(&mut self) -> Result<(), BackendError> {
        if self.primitive.is_some() {
            return Err(BackendError::PrimitiveOpen);
        }
        let (id, builder) = self.compiling.take().ok_or(BackendError::NoActiveList)?;
        let batches = self.upload_list(builder);
        self.lists[id.0 as usize] = Some(batches);
        Ok(())
    }

    fn abort_list(&mut self) {
        if let Some((id, _)) = self.compiling.take() {
            log::debug!("discarding half-built {id:?}");
            self.primitive = None;
            self.pending.clear();
        }
    }

    fn call_list(&mut self, list: DrawListId) {
        if self.compiling.is_some() {
            log::debug!("ignoring call to {list:?} while compiling a list");
            return;
        }
        if !matches!(self.lists.get(list.0 as usize), Some(Some(_))) {
            log::warn!("{}", BackendError::UnknownList(list));
            return;
        }
        let slot = self.current_slot();
        self.commands.push(DrawCmd::List { list, slot });
    }

    fn delete_list(&mut self, list: DrawListId) {
        if let Some(entry) = self.lists.get_mut(list.0 as usize) {
            *entry = None;
        }
    }

    fn set_transform(&mut self, transform: Mat4) {
        let result = self.push_uniforms(|u| u.view_proj = transform.to_cols_array_2d());
        self.log_overflow(result);
    }

    fn set_lighting(&mut self, enabled: bool) {
        let result = self.push_uniforms(|u| u.light[3] = if enabled { 1.0 } else { 0.0 });
        self.log_overflow(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_inherit_previous_state() {
        let mut uniforms = vec![Uniforms::default()];
        push_slot(&mut uniforms, 4, |u| u.light[3] = 1.0).unwrap();
        push_slot(&mut uniforms, 4, |u| u.view_proj = Mat4::from_scale(Vec3::splat(2.0)).to_cols_array_2d()).unwrap();
        assert_eq!(uniforms.len(), 3);
        assert!(uniforms[2].lighting());
        assert_eq!(uniforms[2].transform(), Mat4::from_scale(Vec3::splat(2.0)));
    }

    #[test]
    fn overflow_drops_changes_and_keeps_last_slot() {
        let mut uniforms = vec![Uniforms::default()];
        push_slot(&mut uniforms, 2, |u| u.light[3] = 1.0).unwrap();
        let err = push_slot(&mut uniforms, 2, |u| u.light[3] = 0.0).unwrap_err();
        assert!(matches!(err, BackendError::TooManyDraws(2)));
        assert!(err.to_string().contains("ignored"));
        assert_eq!(uniforms.len(), 2);
        assert!(uniforms[1].lighting());
    }
}
