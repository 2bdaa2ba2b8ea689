//! flow-variants
//!
//! Correlates a declarative glTF document with the objects a rendering engine
//! instantiated from it, and switches `KHR_materials_variants` variants at
//! runtime. Callers get stable facades for materials, meshes, primitives and
//! nodes. Materials only some variant needs are instantiated the first time that
//! variant gets selected, never earlier and never twice.
//!
//! High-level modules
//! - `context`: the `Engine` seam and a headless engine implementing it
//! - `data_structures`: documents, runtime graphs, correlation, variants and facades
//! - `error`: error type of the model
//! - `resources`: helpers to load documents and models from asset files
//!

pub mod context;
pub mod data_structures;
pub mod error;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use context::{Context, Engine, MaterialProperty};
pub use data_structures::{
    correlation::{CorrelationTable, ObjectSet},
    document::{Document, Element, MaterialDefinition, PrimitiveRef},
    facade::{ElementFacade, MaterialFacade, PrimitiveFacade},
    model::{Correlation, Model},
    scene_graph::{ObjectId, RuntimeGraph},
};
pub use error::{Error, Result};
pub use resources::LoadOptions;

/// Initializes `env_logger` once; later calls are ignored.
pub fn init_logger() {
    if let Err(e) = env_logger::try_init() {
        log::debug!("logger already initialized: {}", e);
    };
}
