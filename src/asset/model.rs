use std::path::Path;

use glam::Vec3;

use super::obj::parse_obj;
use crate::error::LoadError;

/// Axis-aligned box around every vertex of a model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn extend(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[cfg(test)]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// A triangle. Indices point into the model's vertex and normal tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Face {
    pub vertices: [u32; 3],
    pub normals: Option<[u32; 3]>,
}

/// A named group of faces (`g` in an OBJ file).
#[derive(Clone, Debug, PartialEq)]
pub struct MeshObject {
    pub name: String,
    pub faces: Vec<Face>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub objects: Vec<MeshObject>,
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub bounds: Bounds,
}

impl Model {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_obj_str(&contents, path)?;
        log::info!(
            "{}: {} vertices, {} faces in {} groups",
            path.display(),
            model.vertices.len(),
            model.face_count(),
            model.objects.len()
        );
        Ok(model)
    }

    /// Parse OBJ text. `path` only labels errors.
    pub fn from_obj_str(contents: &str, path: &Path) -> Result<Self, LoadError> {
        parse_obj(contents, path)
    }

    pub fn face_count(&self) -> usize {
        self.objects.iter().map(|o| o.faces.len()).sum()
    }

    #[cfg(test)]
    pub fn object(&self, name: &str) -> Option<&MeshObject> {
        self.objects.iter().find(|o| o.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_grow_from_empty() {
        let mut b = Bounds::EMPTY;
        assert!(b.is_empty());
        b.extend(Vec3::new(1.0, -2.0, 3.0));
        b.extend(Vec3::new(-1.0, 4.0, 0.0));
        assert!(!b.is_empty());
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 4.0, 3.0));
        assert_eq!(b.center(), Vec3::new(0.0, 1.0, 1.5));
        assert_eq!(b.size(), Vec3::new(2.0, 6.0, 3.0));
    }

    #[test]
    fn load_missing_file() {
        let err = Model::load(Path::new("/nonexistent/teapot.obj")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
