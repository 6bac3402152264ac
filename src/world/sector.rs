use glam::Vec2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Stable index of a sector in the [`SectorStore`](super::store::SectorStore).
pub type SectorId = u32;

/// Most sides a single sector polygon may have.
pub const MAX_SIDES: usize = 64;

/// One edge of a sector. The edge runs from the previous side's `end`
/// (wrapping) to this side's `end`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Side {
    pub x: f32,
    pub y: f32,
    /// Sector on the other side of this edge. `None` means a solid wall.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portal: Option<SectorId>,
}

impl Side {
    pub const fn wall(x: f32, y: f32) -> Self {
        Self { x, y, portal: None }
    }

    pub const fn portal(x: f32, y: f32, to: SectorId) -> Self {
        Self { x, y, portal: Some(to) }
    }

    pub fn end(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A convex room. Sides are stored counter-clockwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub id: SectorId,
    pub floor_height: f32,
    pub ceil_height: f32,
    pub sides: SmallVec<[Side; 8]>,
}

/// A single edge of a sector, resolved to both endpoints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub index: usize,
    pub start: Vec2,
    pub end: Vec2,
    pub portal: Option<SectorId>,
}

impl Edge {
    pub fn length(&self) -> f32 {
        let d = self.start - self.end;
        (d.x * d.x + d.y * d.y).sqrt()
    }
}

impl Sector {
    pub fn new(id: SectorId, floor_height: f32, ceil_height: f32, sides: &[Side]) -> Self {
        Self {
            id,
            floor_height,
            ceil_height,
            sides: SmallVec::from_slice(sides),
        }
    }

    pub fn num_sides(&self) -> usize {
        self.sides.len()
    }

    /// A sector needs at least three sides to be drawn as a polygon.
    pub fn is_polygon(&self) -> bool {
        self.sides.len() > 2
    }

    /// Edges in authored order. Edge `i` starts at side `i - 1` (wrapping).
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        let n = self.sides.len();
        self.sides.iter().enumerate().map(move |(i, side)| {
            let prev = &self.sides[(i + n - 1) % n];
            Edge {
                index: i,
                start: prev.end(),
                end: side.end(),
                portal: side.portal,
            }
        })
    }

    /// Destinations of every portal edge, in winding order.
    pub fn portals(&self) -> impl Iterator<Item = SectorId> + '_ {
        self.sides.iter().filter_map(|s| s.portal)
    }

    /// Twice the signed area. Positive when the sides wind counter-clockwise
    /// in the (x, y) plane.
    pub fn signed_area2(&self) -> f32 {
        self.edges().map(|e| e.start.perp_dot(e.end)).sum()
    }

    /// Structural problems that make the sector unusable.
    pub fn validate(&self) -> Result<(), String> {
        if self.sides.len() < 3 {
            return Err(format!("needs at least 3 sides, has {}", self.sides.len()));
        }
        if self.sides.len() > MAX_SIDES {
            return Err(format!("has {} sides, limit is {MAX_SIDES}", self.sides.len()));
        }
        if self.sides.iter().any(|s| !s.x.is_finite() || !s.y.is_finite()) {
            return Err("vertex is not a finite number".into());
        }
        Ok(())
    }
}

/// Arithmetic mean of every vertex. `None` for a sector with no sides.
pub fn sector_centroid(sector: &Sector) -> Option<Vec2> {
    let n = sector.num_sides();
    if n == 0 {
        return None;
    }
    let total = sector.sides.iter().fold(Vec2::ZERO, |acc, s| acc + s.end());
    Some(total / n as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Sector {
        Sector::new(
            7,
            0.0,
            2.0,
            &[
                Side::wall(0.0, 0.0),
                Side::wall(2.0, 0.0),
                Side::portal(2.0, 2.0, 3),
                Side::wall(0.0, 2.0),
            ],
        )
    }

    #[test]
    fn centroid_of_square() {
        assert_eq!(sector_centroid(&square()), Some(Vec2::new(1.0, 1.0)));
    }

    #[test]
    fn centroid_of_empty_sector_is_none() {
        let empty = Sector::new(0, 0.0, 1.0, &[]);
        assert_eq!(sector_centroid(&empty), None);
    }

    #[test]
    fn first_edge_wraps_from_last_vertex() {
        let sector = square();
        let edges: Vec<Edge> = sector.edges().collect();
        assert_eq!(edges.len(), 4);
        assert_eq!(edges[0].start, Vec2::new(0.0, 2.0));
        assert_eq!(edges[0].end, Vec2::new(0.0, 0.0));
        assert_eq!(edges[2].start, Vec2::new(2.0, 0.0));
        assert_eq!(edges[2].portal, Some(3));
        assert!((edges[1].length() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn winding_sign() {
        assert_eq!(square().signed_area2(), 8.0);
        let mut flipped = square();
        flipped.sides.reverse();
        assert_eq!(flipped.signed_area2(), -8.0);
    }

    #[test]
    fn portals_in_winding_order() {
        let sector = square();
        assert_eq!(sector.portals().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn validate_rejects_degenerate() {
        let two = Sector::new(0, 0.0, 1.0, &[Side::wall(0.0, 0.0), Side::wall(1.0, 0.0)]);
        assert!(two.validate().is_err());
        assert!(!two.is_polygon());
        assert!(square().validate().is_ok());

        let sides: Vec<Side> = (0..=MAX_SIDES).map(|i| Side::wall(i as f32, 0.0)).collect();
        let huge = Sector::new(1, 0.0, 1.0, &sides);
        assert!(huge.validate().is_err());
    }
}
