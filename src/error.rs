//! Errors reported by the correlation and variant switching layer.
//!
//! Engine-facing code keeps returning `anyhow::Result`; whenever such a result
//! crosses into the model it is wrapped in one of the variants below so callers
//! can tell a malformed asset apart from an engine failure.

use crate::data_structures::{
    document::{Element, PrimitiveRef},
    scene_graph::ObjectId,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A variant (or the original bindings) references a material the document doesn't define.
    #[error(
        "variant {variant:?} maps primitive {primitive} to material {material}, but the document only has {available} materials"
    )]
    InvalidVariantDefinition {
        variant: Option<String>,
        primitive: PrimitiveRef,
        material: usize,
        available: usize,
    },

    /// The engine couldn't create a runtime object for a dormant material.
    #[error("failed to instantiate material {material} ({name:?})")]
    Instantiation {
        material: usize,
        name: Option<String>,
        #[source]
        source: anyhow::Error,
    },

    /// The engine refused to bind a material object to a primitive object.
    #[error("failed to bind material object {material} to primitive object {primitive}")]
    Binding {
        primitive: ObjectId,
        material: ObjectId,
        #[source]
        source: anyhow::Error,
    },

    /// A mutation was requested on a material that has no runtime object yet.
    #[error("material {material} is not instantiated yet")]
    Dormant { material: usize },

    /// The engine refused a material property update.
    #[error("failed to update a property of material {material}")]
    Property {
        material: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("{element:?} is already correlated")]
    AlreadyCorrelated { element: Element },

    #[error("refusing to correlate {element:?} with an empty object set")]
    EmptyCorrelation { element: Element },
}

pub type Result<T> = std::result::Result<T, Error>;
