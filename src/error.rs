use std::path::PathBuf;

use thiserror::Error;

use crate::render::backend::DrawListId;
use crate::world::sector::SectorId;

/// Failures raised by a [`RenderBackend`](crate::render::backend::RenderBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("end_list called with no list being compiled")]
    NoActiveList,
    #[error("begin_list called while list {0:?} is still being compiled")]
    NestedList(DrawListId),
    #[error("draw list {0:?} does not exist")]
    UnknownList(DrawListId),
    #[error("primitive still open; call end() first")]
    PrimitiveOpen,
    #[error("no draw list slots left (limit {0})")]
    OutOfLists(usize),
    #[error("frame exceeded {0} transform slots; later transform and lighting changes this frame are ignored")]
    TooManyDraws(usize),
    #[error("texture upload failed: {0}")]
    Texture(String),
}

/// Failures while building or growing the compiled world.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("sector {0} not found")]
    NotFound(SectorId),
    #[error("out of memory growing {table} table to {slots} slots")]
    OutOfMemory { table: &'static str, slots: usize },
    #[error("refusing to overwrite {table} slot #{slot}")]
    SlotOccupied { table: &'static str, slot: usize },
    #[error("sector {id} is invalid: {reason}")]
    InvalidSector { id: SectorId, reason: String },
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("required asset failed to load: {0}")]
    Asset(#[from] LoadError),
}

/// Asset decode failures. Callers log these and leave the slot empty.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{}:{line}: {reason}", path.display())]
    Obj {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("{}: {source}", path.display())]
    Map {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// Malformed startup arguments.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("expected WIDTHxHEIGHT, got \"{0}\"")]
    Geometry(String),
}
