use std::path::Path;

use glam::{Mat4, Vec3};

use super::bake::{emit_model, emit_sector, BakeStats};
use super::sector::{Sector, SectorId};
use super::store::SectorStore;
use crate::asset::model::Model;
use crate::asset::texture::load_texture;
use crate::error::{BackendError, WorldError};
use crate::render::backend::{DrawListId, RenderBackend, TextureId};

/// A sector's floor, ceiling and solid walls baked into one draw list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompiledSector {
    pub list: DrawListId,
    pub stats: BakeStats,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompiledModel {
    pub list: DrawListId,
}

/// A model instance placed in the world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sprite {
    pub model: usize,
    pub position: Vec3,
    pub scale: f32,
}

impl Sprite {
    pub fn transform(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_scale(Vec3::splat(self.scale))
    }
}

/// Everything baked for rendering. Tables are indexed by small integer ids
/// and grow to the next power of two on demand.
#[derive(Debug, Default)]
pub struct World {
    sectors: Vec<Option<CompiledSector>>,
    textures: Vec<Option<TextureId>>,
    models: Vec<Option<CompiledModel>>,
    sprites: Vec<Sprite>,
}

/// Grow `slots` so that index `min - 1` exists. New slots are empty.
fn grow_slots<T>(slots: &mut Vec<Option<T>>, min: usize, table: &'static str) -> Result<(), WorldError> {
    if slots.len() >= min {
        return Ok(());
    }
    let target = min
        .checked_next_power_of_two()
        .ok_or(WorldError::OutOfMemory { table, slots: min })?;
    slots
        .try_reserve_exact(target - slots.len())
        .map_err(|_| WorldError::OutOfMemory { table, slots: target })?;
    slots.resize_with(target, || None);
    log::debug!("{table} table grown to {target} slots");
    Ok(())
}

/// Record `emit` into a fresh list. If the backend refuses to close it the
/// half-built list is discarded so the next compile can start.
fn compile_list<B: RenderBackend + ?Sized, T>(
    backend: &mut B,
    emit: impl FnOnce(&mut B) -> T,
) -> Result<(DrawListId, T), BackendError> {
    let list = backend.begin_list()?;
    let out = emit(backend);
    if let Err(e) = backend.end_list() {
        backend.abort_list();
        return Err(e);
    }
    Ok((list, out))
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots currently allocated in the sector table.
    pub fn capacity(&self) -> usize {
        self.sectors.len()
    }

    pub fn compiled(&self, id: SectorId) -> Option<&CompiledSector> {
        self.sectors.get(id as usize).and_then(Option::as_ref)
    }

    #[cfg(test)]
    pub fn textures(&self) -> &[Option<TextureId>] {
        &self.textures
    }

    #[cfg(test)]
    pub fn sprites(&self) -> &[Sprite] {
        &self.sprites
    }

    /// Bake `sector` into a draw list stored at `id`.
    ///
    /// On failure every previously registered sector is left untouched.
    /// Registering an id twice replaces the old list and frees it.
    pub fn register_sector<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        id: SectorId,
        sector: &Sector,
    ) -> Result<BakeStats, WorldError> {
        sector
            .validate()
            .map_err(|reason| WorldError::InvalidSector { id, reason })?;
        if sector.id != id {
            log::warn!("sector {} registered under id {id}", sector.id);
        }

        let idx = id as usize;
        grow_slots(&mut self.sectors, idx.saturating_add(1), "sector")?;

        let textures = &self.textures;
        let (list, stats) = compile_list(backend, |b| emit_sector(b, sector, textures))?;

        if let Some(old) = self.sectors[idx].replace(CompiledSector { list, stats }) {
            backend.delete_list(old.list);
        }
        log::debug!(
            "sector {id}: {} walls, {} portals -> list {:?}",
            stats.walls,
            stats.portals,
            list
        );
        Ok(stats)
    }

    /// Register every sector in the store. Stops at the first failure.
    pub fn register_store<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        store: &SectorStore,
    ) -> Result<usize, WorldError> {
        let mut count = 0;
        for sector in store.iter() {
            self.register_sector(backend, sector.id, sector)?;
            count += 1;
        }
        log::info!("compiled {count} sectors ({} slots)", self.capacity());
        Ok(count)
    }

    /// Decode and upload textures in order. A failed file leaves its slot
    /// empty and geometry bound to it draws untextured.
    pub fn load_textures<B: RenderBackend + ?Sized, P: AsRef<Path>>(
        &mut self,
        backend: &mut B,
        paths: &[P],
    ) -> usize {
        self.textures.clear();
        let mut loaded = 0;
        for path in paths {
            let path = path.as_ref();
            let slot = match load_texture(path) {
                Ok(image) => match backend.create_texture(&image) {
                    Ok(id) => {
                        log::debug!("{}: {}x{} -> {id:?}", path.display(), image.width, image.height);
                        loaded += 1;
                        Some(id)
                    }
                    Err(e) => {
                        log::warn!("{}: {e}", path.display());
                        None
                    }
                },
                Err(e) => {
                    log::warn!("{e}");
                    None
                }
            };
            self.textures.push(slot);
        }
        loaded
    }

    /// Compile a model into `slot`. An occupied slot is refused.
    pub fn add_model<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        slot: usize,
        model: &Model,
        color: [f32; 4],
    ) -> Result<(), WorldError> {
        grow_slots(&mut self.models, slot.saturating_add(1), "model")?;
        if self.models[slot].is_some() {
            return Err(WorldError::SlotOccupied { table: "model", slot });
        }

        let (list, ()) = compile_list(backend, |b| emit_model(b, model, color))?;

        self.models[slot] = Some(CompiledModel { list });
        log::debug!(
            "model #{slot}: {} faces, extent {:?} -> list {list:?}",
            model.face_count(),
            model.bounds.size()
        );
        Ok(())
    }

    pub fn model(&self, slot: usize) -> Option<&CompiledModel> {
        self.models.get(slot).and_then(Option::as_ref)
    }

    pub fn add_sprite(&mut self, sprite: Sprite) {
        self.sprites.push(sprite);
    }

    /// Draw every sprite whose model is present. Restores `view_proj`
    /// afterwards. Returns how many were drawn.
    pub fn draw_sprites<B: RenderBackend + ?Sized>(&self, backend: &mut B, view_proj: Mat4) -> usize {
        let mut drawn = 0;
        for sprite in &self.sprites {
            let Some(model) = self.model(sprite.model) else {
                log::trace!("sprite skipped: model #{} not loaded", sprite.model);
                continue;
            };
            backend.set_transform(view_proj * sprite.transform());
            backend.call_list(model.list);
            drawn += 1;
        }
        if drawn > 0 {
            backend.set_transform(view_proj);
        }
        drawn
    }
}
