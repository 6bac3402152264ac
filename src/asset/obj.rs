//! Wavefront OBJ subset: `v`, `vn`, `vt`, `f`, `g`, `o` and comments.
//! Polygons are fan-triangulated. Texture coordinates are read and dropped.

use std::path::Path;

use glam::Vec3;

use super::model::{Bounds, Face, MeshObject, Model};
use crate::error::LoadError;

const UNGROUPED: &str = "ungrouped";

struct Parser<'a> {
    path: &'a Path,
    line: usize,
}

impl Parser<'_> {
    fn err(&self, reason: impl Into<String>) -> LoadError {
        LoadError::Obj {
            path: self.path.to_path_buf(),
            line: self.line,
            reason: reason.into(),
        }
    }

    fn floats<const N: usize>(&self, fields: &[&str], what: &str) -> Result<[f32; N], LoadError> {
        if fields.len() < N {
            return Err(self.err(format!("{what} needs {N} values, got {}", fields.len())));
        }
        let mut out = [0.0; N];
        for (slot, field) in out.iter_mut().zip(fields) {
            *slot = field
                .parse()
                .map_err(|_| self.err(format!("bad number {field:?} in {what}")))?;
        }
        Ok(out)
    }

    /// Resolve a 1-based (or negative, relative) OBJ index into `len` entries.
    fn index(&self, field: &str, len: usize, what: &str) -> Result<u32, LoadError> {
        let raw: i64 = field
            .parse()
            .map_err(|_| self.err(format!("bad {what} index {field:?}")))?;
        let resolved = match raw {
            0 => None,
            n if n > 0 => Some(n - 1),
            n => Some(len as i64 + n),
        };
        match resolved {
            Some(i) if i >= 0 && (i as usize) < len => Ok(i as u32),
            _ => Err(self.err(format!("{what} index {raw} out of range (have {len})"))),
        }
    }
}

pub fn parse_obj(contents: &str, path: &Path) -> Result<Model, LoadError> {
    let mut p = Parser { path, line: 0 };
    let mut vertices: Vec<Vec3> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    let mut texcoords = 0usize;
    let mut objects: Vec<MeshObject> = Vec::new();
    let mut bounds = Bounds::EMPTY;

    for (n, raw) in contents.lines().enumerate() {
        p.line = n + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(cmd) = fields.next() else { continue };
        let rest: Vec<&str> = fields.collect();

        match cmd {
            "v" => {
                let [x, y, z] = p.floats::<3>(&rest, "vertex")?;
                let v = Vec3::new(x, y, z);
                bounds.extend(v);
                vertices.push(v);
            }
            "vn" => {
                let [x, y, z] = p.floats::<3>(&rest, "normal")?;
                normals.push(Vec3::new(x, y, z));
            }
            "vt" => {
                p.floats::<2>(&rest, "texture coordinate")?;
                texcoords += 1;
            }
            "g" => {
                let name = if rest.is_empty() { UNGROUPED.to_string() } else { rest.join(" ") };
                objects.push(MeshObject { name, faces: Vec::new() });
            }
            "o" | "s" | "usemtl" | "mtllib" => {
                log::trace!("{}:{}: ignoring {cmd}", path.display(), p.line);
            }
            "f" => {
                if rest.len() < 3 {
                    return Err(p.err(format!("face needs 3 vertices, got {}", rest.len())));
                }
                let mut corners: Vec<(u32, Option<u32>)> = Vec::with_capacity(rest.len());
                for field in &rest {
                    let mut parts = field.split('/');
                    let v = match parts.next() {
                        Some(s) if !s.is_empty() => p.index(s, vertices.len(), "vertex")?,
                        _ => return Err(p.err(format!("face corner {field:?} has no vertex"))),
                    };
                    if let Some(t) = parts.next().filter(|s| !s.is_empty()) {
                        p.index(t, texcoords, "texture")?;
                    }
                    let vn = match parts.next().filter(|s| !s.is_empty()) {
                        Some(s) => Some(p.index(s, normals.len(), "normal")?),
                        None => None,
                    };
                    corners.push((v, vn));
                }

                if objects.is_empty() {
                    log::debug!("{}:{}: face data before group name", path.display(), p.line);
                    objects.push(MeshObject { name: UNGROUPED.to_string(), faces: Vec::new() });
                }
                let group = objects.len() - 1;
                for i in 1..corners.len() - 1 {
                    let tri = [corners[0], corners[i], corners[i + 1]];
                    let face_normals = match tri.map(|c| c.1) {
                        [Some(a), Some(b), Some(c)] => Some([a, b, c]),
                        _ => None,
                    };
                    objects[group].faces.push(Face {
                        vertices: tri.map(|c| c.0),
                        normals: face_normals,
                    });
                }
            }
            other => {
                log::debug!("{}:{}: unknown directive {other:?}", path.display(), p.line);
            }
        }
    }

    objects.retain(|o| !o.faces.is_empty());
    if vertices.is_empty() {
        return Err(LoadError::Invalid {
            path: path.to_path_buf(),
            reason: "no vertices".into(),
        });
    }

    Ok(Model {
        objects,
        vertices,
        normals,
        bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(src: &str) -> Result<Model, LoadError> {
        parse_obj(src, Path::new("test.obj"))
    }

    #[test]
    fn faces_before_group_are_ungrouped() {
        let m = parse(
            "# tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\ng lid\nf 3 2 1\n",
        )
        .unwrap();
        assert_eq!(m.objects.len(), 2);
        assert_eq!(m.objects[0].name, "ungrouped");
        assert_eq!(m.object("lid").unwrap().faces[0].vertices, [2, 1, 0]);
    }

    #[test]
    fn quad_is_fanned() {
        let m = parse("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").unwrap();
        let faces = &m.objects[0].faces;
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].vertices, [0, 1, 2]);
        assert_eq!(faces[1].vertices, [0, 2, 3]);
    }

    #[test]
    fn pentagon_is_fanned() {
        let m = parse("v 0 0 0\nv 1 0 0\nv 2 1 0\nv 1 2 0\nv 0 1 0\nf 1 2 3 4 5\n").unwrap();
        assert_eq!(m.face_count(), 3);
    }

    #[test]
    fn slash_forms_and_normals() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvn 0 0 1\n\
                   f 1/1/1 2/1/1 3/1/1\nf 1//1 2//1 3//1\nf 1/1 2/1 3/1\n";
        let m = parse(src).unwrap();
        let faces = &m.objects[0].faces;
        assert_eq!(faces[0].normals, Some([0, 0, 0]));
        assert_eq!(faces[1].normals, Some([0, 0, 0]));
        assert_eq!(faces[2].normals, None);
    }

    #[test]
    fn negative_indices_are_relative() {
        let m = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(m.objects[0].faces[0].vertices, [0, 1, 2]);
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let m = parse("v -1 0 2\nv 3 -4 0\nv 0 5 -6\nf 1 2 3\n").unwrap();
        assert_eq!(m.bounds.min, Vec3::new(-1.0, -4.0, -6.0));
        assert_eq!(m.bounds.max, Vec3::new(3.0, 5.0, 2.0));
    }

    #[test]
    fn out_of_range_index_reports_line() {
        let err = parse("v 0 0 0\nv 1 0 0\n\nf 1 2 9\n").unwrap_err();
        match err {
            LoadError::Obj { line, reason, .. } => {
                assert_eq!(line, 4);
                assert!(reason.contains("out of range"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n").is_err());
    }

    #[test]
    fn malformed_vertex_fails() {
        assert!(matches!(parse("v 0 zero 0\n"), Err(LoadError::Obj { line: 1, .. })));
        assert!(matches!(parse("v 0 0\n"), Err(LoadError::Obj { .. })));
        assert!(matches!(parse("# nothing\n"), Err(LoadError::Invalid { .. })));
    }

    #[test]
    fn load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "o thing\nv 0 0 0\nv 1 0 0\nv 0 0 1\ng body\nf 1 2 3").unwrap();
        let m = Model::load(file.path()).unwrap();
        assert_eq!(m.objects[0].name, "body");
        assert_eq!(m.face_count(), 1);
    }
}
