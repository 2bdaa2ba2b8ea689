//! Stable handles for declarative elements and their runtime objects.
//!
//! A facade is just an element plus a reference to the state of the model it
//! belongs to, so it stays valid while the engine objects behind it change.
//! Everything here is synchronous; the only suspending operation is
//! [`MaterialFacade::ensure_loaded`].

use std::{fmt, sync::Arc};

use gltf::material::AlphaMode;

use crate::{
    context::MaterialProperty,
    data_structures::{
        correlation::ObjectSet,
        document::{Element, MaterialDefinition, PrimitiveRef},
        model::{Correlation, Shared},
        transform::Transform,
    },
    error::{Error, Result},
};

/// Handle for a mesh or node.
#[derive(Clone)]
pub struct ElementFacade {
    element: Element,
    name: Option<String>,
    shared: Arc<Shared>,
}

impl ElementFacade {
    pub(crate) fn new(element: Element, name: Option<String>, shared: Arc<Shared>) -> Self {
        Self {
            element,
            name,
            shared,
        }
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Position of the element in its document list.
    pub fn index(&self) -> usize {
        match self.element {
            Element::Material(index) | Element::Mesh(index) | Element::Node(index) => index,
            Element::Primitive(primitive) => primitive.primitive,
        }
    }

    /// Objects instantiated from this element; `None` if it isn't part of the scene.
    pub fn correlated_objects(&self) -> Option<ObjectSet> {
        self.shared.state.read().table.get(&self.element).cloned()
    }

    /// Local transform as written in the document, for nodes.
    pub fn local_transform(&self) -> Option<Transform> {
        match self.element {
            Element::Node(index) => self
                .shared
                .document
                .nodes()
                .get(index)
                .map(|node| node.transform),
            _ => None,
        }
    }
}

impl fmt::Debug for ElementFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementFacade")
            .field("element", &self.element)
            .field("name", &self.name)
            .finish()
    }
}

/// Handle for a material that may or may not be instantiated yet.
#[derive(Clone)]
pub struct MaterialFacade {
    index: usize,
    shared: Arc<Shared>,
}

impl MaterialFacade {
    pub(crate) fn new(index: usize, shared: Arc<Shared>) -> Self {
        Self { index, shared }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn element(&self) -> Element {
        Element::Material(self.index)
    }

    pub fn name(&self) -> Option<&str> {
        self.definition().name.as_deref()
    }

    /// The material as the document defines it.
    pub fn definition(&self) -> &MaterialDefinition {
        &self.shared.document.materials()[self.index]
    }

    pub fn correlation(&self) -> Correlation {
        // facades are only handed out for materials the model knows
        self.shared
            .correlation(self.index)
            .unwrap_or_else(|| Correlation::Dormant(self.definition().clone()))
    }

    /// Runtime objects of this material, `None` while it is dormant.
    pub fn correlated_objects(&self) -> Option<ObjectSet> {
        match self.shared.correlation(self.index) {
            Some(Correlation::Active(objects)) => Some(objects),
            _ => None,
        }
    }

    /// Definition the engine will be handed on first use, `None` once instantiated.
    pub fn lazy_load_info(&self) -> Option<MaterialDefinition> {
        match self.shared.correlation(self.index) {
            Some(Correlation::Dormant(definition)) => Some(definition),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.correlated_objects().is_some()
    }

    /// Instantiates the material without switching variants. Waits for a running switch.
    pub async fn ensure_loaded(&self) -> Result<()> {
        let _guard = self.shared.switch_lock.lock().await;
        self.shared.materialize(self.index).await.map(|_| ())
    }

    pub fn set_base_color_factor(&self, color: impl Into<cgmath::Vector4<f32>>) -> Result<()> {
        self.apply(MaterialProperty::BaseColorFactor(color.into()))
    }

    pub fn set_emissive_factor(&self, color: impl Into<cgmath::Vector3<f32>>) -> Result<()> {
        self.apply(MaterialProperty::EmissiveFactor(color.into()))
    }

    pub fn set_metallic_factor(&self, factor: f32) -> Result<()> {
        self.apply(MaterialProperty::MetallicFactor(factor))
    }

    pub fn set_roughness_factor(&self, factor: f32) -> Result<()> {
        self.apply(MaterialProperty::RoughnessFactor(factor))
    }

    /// `cutoff` only matters for [`AlphaMode::Mask`].
    pub fn set_alpha_mode(&self, mode: AlphaMode, cutoff: Option<f32>) -> Result<()> {
        self.apply(MaterialProperty::AlphaMode(mode, cutoff))
    }

    pub fn set_double_sided(&self, double_sided: bool) -> Result<()> {
        self.apply(MaterialProperty::DoubleSided(double_sided))
    }

    fn apply(&self, property: MaterialProperty) -> Result<()> {
        let objects = self.correlated_objects().ok_or(Error::Dormant {
            material: self.index,
        })?;
        for object in objects.iter() {
            self.shared
                .engine
                .set_material_property(*object, property)
                .map_err(|source| Error::Property {
                    material: self.index,
                    source,
                })?;
        }
        Ok(())
    }
}

impl PartialEq for MaterialFacade {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for MaterialFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterialFacade")
            .field("index", &self.index)
            .field("name", &self.name())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Handle for one mesh primitive and its material slot.
#[derive(Clone)]
pub struct PrimitiveFacade {
    primitive: PrimitiveRef,
    shared: Arc<Shared>,
}

impl PrimitiveFacade {
    pub(crate) fn new(primitive: PrimitiveRef, shared: Arc<Shared>) -> Self {
        Self { primitive, shared }
    }

    pub fn primitive(&self) -> PrimitiveRef {
        self.primitive
    }

    pub fn element(&self) -> Element {
        Element::Primitive(self.primitive)
    }

    pub fn correlated_objects(&self) -> Option<ObjectSet> {
        self.shared
            .state
            .read()
            .table
            .get(&Element::Primitive(self.primitive))
            .cloned()
    }

    /// Index of the material the document assigns outside of any variant.
    pub fn original_material(&self) -> Option<usize> {
        self.shared.document.original_material(self.primitive)
    }

    /// `(variant name, material index)` for every variant that remaps this primitive.
    pub fn variant_materials(&self) -> Vec<(String, usize)> {
        let document = &self.shared.document;
        let Some(definition) = document.primitive(self.primitive) else {
            return Vec::new();
        };
        definition
            .mappings
            .iter()
            .flat_map(|mapping| {
                mapping.variants.iter().filter_map(move |variant| {
                    document
                        .variants()
                        .get(*variant)
                        .map(|name| (name.clone(), mapping.material))
                })
            })
            .collect()
    }

    /// The material currently bound to this primitive's runtime objects.
    pub fn active_material(&self) -> Option<MaterialFacade> {
        let object = *self.correlated_objects()?.first()?;
        let state = self.shared.state.read();
        let bound = match state.bindings.get(&object) {
            Some(bound) => *bound,
            None => self.shared.engine.bound_material(object)?,
        };
        let index = state
            .table
            .sources_of(bound)?
            .iter()
            .find_map(|element| match element {
                Element::Material(index) if *index < state.materials.len() => Some(*index),
                _ => None,
            })?;
        Some(MaterialFacade::new(index, self.shared.clone()))
    }
}

impl fmt::Debug for PrimitiveFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveFacade")
            .field("primitive", &self.primitive)
            .finish()
    }
}
