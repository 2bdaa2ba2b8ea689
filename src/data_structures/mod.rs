//! Data structures for both sides of a loaded asset and the glue between them.
//!
//! - `document` is the declarative side: materials, meshes, nodes and variants as parsed
//! - `scene_graph` is the runtime side: the object tree an engine instantiated
//! - `correlation` is the bidirectional index between the two
//! - `variants` holds the per-variant material substitutions
//! - `facade` contains the stable handles callers work with
//! - `model` ties everything together and switches variants
//! - `transform` contains node transforms

pub mod correlation;
pub mod document;
pub mod facade;
pub mod model;
pub mod scene_graph;
pub mod transform;
pub mod variants;
