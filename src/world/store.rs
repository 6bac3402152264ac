use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::sector::{Sector, SectorId, Side};
use crate::error::{LoadError, WorldError};

/// Canonical, read-only sector definitions keyed by id.
#[derive(Clone, Debug, Default)]
pub struct SectorStore {
    sectors: BTreeMap<SectorId, Sector>,
}

/// On-disk layout of a sector map.
#[derive(Debug, Default, Serialize, Deserialize)]
struct MapFile {
    #[serde(rename = "sector", default)]
    sectors: Vec<Sector>,
}

impl SectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two rooms sharing one portal edge: (1,2)-(5,7).
    pub fn demo() -> Self {
        let mut store = Self::new();
        store.insert(Sector::new(
            0,
            0.0,
            2.0,
            &[
                Side::wall(1.0, 16.0),
                Side::wall(5.0, 11.0),
                Side::wall(5.0, 7.0),
                Side::portal(1.0, 2.0, 1),
            ],
        ));
        store.insert(Sector::new(
            1,
            0.0,
            2.0,
            &[
                Side::wall(8.0, 6.0),
                Side::wall(10.0, 1.0),
                Side::wall(1.0, 2.0),
                Side::portal(5.0, 7.0, 0),
            ],
        ));
        store
    }

    /// Insert or replace a sector under its own id.
    pub fn insert(&mut self, sector: Sector) -> Option<Sector> {
        self.sectors.insert(sector.id, sector)
    }

    pub fn get(&self, id: SectorId) -> Option<&Sector> {
        self.sectors.get(&id)
    }

    /// Lookup that reports a missing id as [`WorldError::NotFound`].
    pub fn get_sector(&self, id: SectorId) -> Result<&Sector, WorldError> {
        self.get(id).ok_or(WorldError::NotFound(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sector> {
        self.sectors.values()
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents, path)
    }

    pub fn from_toml(contents: &str, path: &Path) -> Result<Self, LoadError> {
        let file: MapFile = toml::from_str(contents).map_err(|source| LoadError::Map {
            path: path.to_path_buf(),
            source,
        })?;

        let mut store = Self::new();
        for sector in file.sectors {
            let id = sector.id;
            sector.validate().map_err(|reason| LoadError::Invalid {
                path: path.to_path_buf(),
                reason: format!("sector {id}: {reason}"),
            })?;
            if sector.floor_height >= sector.ceil_height {
                log::warn!(
                    "{}: sector {id} floor {} is not below ceiling {}",
                    path.display(),
                    sector.floor_height,
                    sector.ceil_height
                );
            }
            if store.insert(sector).is_some() {
                return Err(LoadError::Invalid {
                    path: path.to_path_buf(),
                    reason: format!("duplicate sector id {id}"),
                });
            }
        }

        for sector in store.iter() {
            for dest in sector.portals() {
                if store.get(dest).is_none() {
                    log::warn!(
                        "{}: sector {} has a portal to missing sector {dest}",
                        path.display(),
                        sector.id
                    );
                }
            }
        }

        log::info!("{}: loaded {} sectors", path.display(), store.len());
        Ok(store)
    }

    #[cfg(test)]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        let file = MapFile {
            sectors: self.sectors.values().cloned().collect(),
        };
        toml::to_string_pretty(&file)
    }

    /// Dump a sector's portal table at debug level.
    pub fn log_sector(&self, id: SectorId) {
        let Some(sector) = self.get(id) else {
            log::debug!("sector {id}: not found");
            return;
        };
        let dests: Vec<String> = sector
            .sides
            .iter()
            .map(|s| match s.portal {
                Some(to) => to.to_string(),
                None => "-".into(),
            })
            .collect();
        log::debug!("sector {id} dest: {}", dests.join(" "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn demo_rooms_port_into_each_other() {
        let store = SectorStore::demo();
        assert_eq!(store.len(), 2);
        let a = store.get_sector(0).unwrap();
        let b = store.get_sector(1).unwrap();
        assert_eq!(a.portals().collect::<Vec<_>>(), vec![1]);
        assert_eq!(b.portals().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn missing_sector_is_not_found() {
        let store = SectorStore::demo();
        assert!(matches!(store.get_sector(42), Err(WorldError::NotFound(42))));
    }

    #[test]
    fn parses_map_file() {
        let src = r#"
            [[sector]]
            id = 10
            floor_height = 0.0
            ceil_height = 3.0
            sides = [
                { x = 0.0, y = 0.0 },
                { x = 4.0, y = 0.0, portal = 11 },
                { x = 4.0, y = 4.0 },
            ]

            [[sector]]
            id = 11
            floor_height = 0.5
            ceil_height = 2.5
            sides = [
                { x = 4.0, y = 0.0 },
                { x = 8.0, y = 0.0 },
                { x = 0.0, y = 0.0, portal = 10 },
            ]
        "#;
        let store = SectorStore::from_toml(src, Path::new("test.toml")).unwrap();
        assert_eq!(store.len(), 2);
        let s = store.get(10).unwrap();
        assert_eq!(s.num_sides(), 3);
        assert_eq!(s.sides[1].portal, Some(11));
        assert_eq!(store.get(11).unwrap().floor_height, 0.5);
    }

    #[test]
    fn rejects_two_sided_sector() {
        let src = r#"
            [[sector]]
            id = 0
            floor_height = 0.0
            ceil_height = 1.0
            sides = [ { x = 0.0, y = 0.0 }, { x = 1.0, y = 0.0 } ]
        "#;
        let err = SectorStore::from_toml(src, Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { .. }));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let store = SectorStore::demo();
        let mut text = store.to_toml().unwrap();
        text.push_str(&store.to_toml().unwrap());
        let err = SectorStore::from_toml(&text, Path::new("dup.toml")).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SectorStore::demo().to_toml().unwrap().as_bytes())
            .unwrap();
        let store = SectorStore::load(file.path()).unwrap();
        assert_eq!(store.get(1).unwrap().sides[3].portal, Some(0));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = SectorStore::load(Path::new("/nonexistent/map.toml")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
