use glam::{Vec2, Vec3};

use super::sector::Sector;
use crate::asset::model::Model;
use crate::render::backend::{Primitive, RenderBackend, TextureId};

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// What one sector bake emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BakeStats {
    pub walls: usize,
    pub portals: usize,
}

fn texture_for(textures: &[Option<TextureId>], slot: usize) -> Option<TextureId> {
    if textures.is_empty() {
        return None;
    }
    textures[slot % textures.len()]
}

/// Emit a sector's floor fan, ceiling fan and solid walls.
///
/// Portal edges produce no geometry. Wall texture coordinates run along
/// the wall's length so the texture repeats once per world unit; the
/// vertical coordinate is the absolute height.
pub fn emit_sector<B: RenderBackend + ?Sized>(
    backend: &mut B,
    sector: &Sector,
    textures: &[Option<TextureId>],
) -> BakeStats {
    let floor = sector.floor_height;
    let ceil = sector.ceil_height;

    backend.color(WHITE);
    if sector.is_polygon() {
        backend.bind_texture(texture_for(textures, 0));
        backend.normal(Vec3::Y);
        backend.begin(Primitive::TriangleFan);
        for side in &sector.sides {
            backend.vertex(Vec3::new(side.x, floor, side.y), side.end());
        }
        backend.end();

        // ceiling faces down, so walk the vertices the other way
        backend.bind_texture(texture_for(textures, 1));
        backend.normal(Vec3::NEG_Y);
        backend.begin(Primitive::TriangleFan);
        for side in sector.sides.iter().rev() {
            backend.vertex(Vec3::new(side.x, ceil, side.y), side.end());
        }
        backend.end();
    }

    // authored maps are not consistent about winding
    let winding = if sector.signed_area2() < 0.0 { -1.0 } else { 1.0 };
    let mut stats = BakeStats::default();
    for edge in sector.edges() {
        if edge.portal.is_some() {
            stats.portals += 1;
            continue;
        }
        stats.walls += 1;

        let length = edge.length();
        let dir = edge.end - edge.start;
        let inward = (Vec3::new(-dir.y, 0.0, dir.x) * winding).normalize_or_zero();

        backend.bind_texture(texture_for(textures, edge.index));
        backend.normal(inward);
        backend.begin(Primitive::TriangleStrip);
        backend.vertex(Vec3::new(edge.start.x, ceil, edge.start.y), Vec2::new(length, ceil));
        backend.vertex(Vec3::new(edge.end.x, ceil, edge.end.y), Vec2::new(0.0, ceil));
        backend.vertex(Vec3::new(edge.start.x, floor, edge.start.y), Vec2::new(length, floor));
        backend.vertex(Vec3::new(edge.end.x, floor, edge.end.y), Vec2::new(0.0, floor));
        backend.end();
    }
    backend.bind_texture(None);
    stats
}

/// Emit every face of every object. Faces without normals get a flat one.
pub fn emit_model<B: RenderBackend + ?Sized>(backend: &mut B, model: &Model, color: [f32; 4]) {
    backend.bind_texture(None);
    backend.color(color);
    backend.begin(Primitive::Triangles);
    for object in &model.objects {
        for face in &object.faces {
            let [a, b, c] = face.vertices.map(|i| model.vertices[i as usize]);
            let flat = (b - a).cross(c - a).normalize_or_zero();
            for (k, &p) in [a, b, c].iter().enumerate() {
                let n = face
                    .normals
                    .and_then(|ns| model.normals.get(ns[k] as usize).copied())
                    .unwrap_or(flat);
                backend.normal(n);
                backend.vertex(p, Vec2::ZERO);
            }
        }
    }
    backend.end();
}
