//! The runtime side: what the engine instantiated from a document.
//!
//! The engine owns its objects; this crate only ever sees them as opaque
//! [`ObjectId`]s. A [`RuntimeGraph`] is the loader's report of the object tree it
//! built, where every object remembers the declarative element it came from. It
//! is consumed once to build the correlation table and never kept around.

use std::fmt;

use crate::data_structures::{
    document::{Element, PrimitiveRef},
    transform::Transform,
};

/// Opaque handle of an engine owned object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One drawable primitive instance and the material object bound to it at load time.
#[derive(Clone, Debug)]
pub struct RuntimePrimitive {
    pub object: ObjectId,
    pub source: PrimitiveRef,
    pub material: ObjectId,
}

/// The mesh instance attached to a node.
#[derive(Clone, Debug)]
pub struct RuntimeMesh {
    pub object: ObjectId,
    pub source: usize,
    pub primitives: Vec<RuntimePrimitive>,
}

#[derive(Clone, Debug)]
pub struct RuntimeNode {
    pub object: ObjectId,
    /// `None` for helper objects the engine inserted on its own.
    pub source: Option<usize>,
    pub world_transform: Transform,
    pub mesh: Option<RuntimeMesh>,
    pub children: Vec<RuntimeNode>,
}

impl RuntimeNode {
    /// Every `(object, element)` pair of this subtree, parents first.
    pub fn visit(&self, visitor: &mut dyn FnMut(ObjectId, Element)) {
        if let Some(node) = self.source {
            visitor(self.object, Element::Node(node));
        }
        if let Some(mesh) = &self.mesh {
            visitor(mesh.object, Element::Mesh(mesh.source));
            for primitive in &mesh.primitives {
                visitor(primitive.object, Element::Primitive(primitive.source));
            }
        }
        for child in &self.children {
            child.visit(visitor);
        }
    }

    /// Primitives of this subtree, parents first.
    pub fn primitives(&self) -> Vec<&RuntimePrimitive> {
        let mut primitives: Vec<&RuntimePrimitive> = self
            .mesh
            .iter()
            .flat_map(|mesh| mesh.primitives.iter())
            .collect();
        for child in &self.children {
            primitives.append(&mut child.primitives());
        }
        primitives
    }
}

/// The instantiated object graph of one document.
#[derive(Clone, Debug, Default)]
pub struct RuntimeGraph {
    pub roots: Vec<RuntimeNode>,
    /// Material objects and the material each was instantiated from. Deduplicating
    /// engines may list one object for several materials.
    pub materials: Vec<(ObjectId, usize)>,
}

impl RuntimeGraph {
    /// Every `(object, element)` association of the graph, materials first.
    pub fn visit(&self, visitor: &mut dyn FnMut(ObjectId, Element)) {
        for (object, material) in &self.materials {
            visitor(*object, Element::Material(*material));
        }
        for root in &self.roots {
            root.visit(visitor);
        }
    }

    pub fn primitives(&self) -> Vec<&RuntimePrimitive> {
        self.roots.iter().flat_map(|root| root.primitives()).collect()
    }
}
