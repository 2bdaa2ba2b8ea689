//! The seam to the rendering engine, plus a headless engine implementing it.
//!
//! The model never touches engine objects directly. Everything it needs from the
//! engine goes through [`Engine`]: creating a material object from a definition,
//! reading and writing the material slot of a primitive object and updating
//! material properties. [`Context`] is an in-memory engine that keeps the same
//! object graph an actual renderer would, without any GPU behind it. Tools use it
//! to inspect assets and tests use it to observe bindings.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use futures::future::BoxFuture;
use gltf::material::AlphaMode;
use instant::Duration;
use parking_lot::RwLock;

use crate::data_structures::{
    document::{Document, MaterialDefinition, PrimitiveRef},
    scene_graph::{ObjectId, RuntimeGraph, RuntimeMesh, RuntimeNode, RuntimePrimitive},
    transform::Transform,
};

/// A single material property update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaterialProperty {
    BaseColorFactor(cgmath::Vector4<f32>),
    EmissiveFactor(cgmath::Vector3<f32>),
    MetallicFactor(f32),
    RoughnessFactor(f32),
    AlphaMode(AlphaMode, Option<f32>),
    DoubleSided(bool),
}

/// What the model consumes from the rendering engine.
pub trait Engine: Send + Sync {
    /// Creates a runtime material object. May suspend, e.g. while textures are prepared.
    fn instantiate_material<'a>(
        &'a self,
        definition: &'a MaterialDefinition,
    ) -> BoxFuture<'a, anyhow::Result<ObjectId>>;

    /// Material object currently bound to a primitive object.
    fn bound_material(&self, primitive: ObjectId) -> Option<ObjectId>;

    fn bind_material(&self, primitive: ObjectId, material: ObjectId) -> anyhow::Result<()>;

    fn set_material_property(
        &self,
        material: ObjectId,
        property: MaterialProperty,
    ) -> anyhow::Result<()>;
}

/// Engine-side state of an instantiated material.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialInstance {
    pub name: Option<String>,
    pub base_color_factor: cgmath::Vector4<f32>,
    pub emissive_factor: cgmath::Vector3<f32>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: Option<f32>,
    pub double_sided: bool,
}

impl From<&MaterialDefinition> for MaterialInstance {
    fn from(definition: &MaterialDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            base_color_factor: definition.base_color_factor,
            emissive_factor: definition.emissive_factor,
            metallic_factor: definition.metallic_factor,
            roughness_factor: definition.roughness_factor,
            alpha_mode: definition.alpha_mode,
            alpha_cutoff: definition.alpha_cutoff,
            double_sided: definition.double_sided,
        }
    }
}

impl MaterialInstance {
    fn apply(&mut self, property: MaterialProperty) {
        match property {
            MaterialProperty::BaseColorFactor(color) => self.base_color_factor = color,
            MaterialProperty::EmissiveFactor(color) => self.emissive_factor = color,
            MaterialProperty::MetallicFactor(factor) => self.metallic_factor = factor,
            MaterialProperty::RoughnessFactor(factor) => self.roughness_factor = factor,
            MaterialProperty::AlphaMode(mode, cutoff) => {
                self.alpha_mode = mode;
                self.alpha_cutoff = cutoff;
            }
            MaterialProperty::DoubleSided(double_sided) => self.double_sided = double_sided,
        }
    }
}

#[derive(Clone, Debug)]
enum RuntimeObject {
    Node { name: Option<String> },
    Mesh,
    Primitive { source: PrimitiveRef, material: ObjectId },
    Material(MaterialInstance),
}

/// Headless engine: an arena of runtime objects addressed by [`ObjectId`].
#[derive(Debug)]
pub struct Context {
    objects: RwLock<HashMap<ObjectId, RuntimeObject>>,
    next_id: AtomicU64,
    latency: Option<Duration>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            latency: None,
        }
    }

    /// Every material instantiation suspends for `latency`, like waiting on texture uploads.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::new()
        }
    }

    fn spawn(&self, object: RuntimeObject) -> ObjectId {
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.objects.write().insert(id, object);
        id
    }

    /// Instantiates the document's scene with every primitive bound to its original
    /// material. Only materials used by those bindings get an object, one per material.
    pub fn instantiate_document(&self, document: &Document) -> anyhow::Result<RuntimeGraph> {
        let mut materials: HashMap<usize, ObjectId> = HashMap::new();
        let mut roots = Vec::with_capacity(document.roots().len());
        for root in document.roots() {
            let mut path = Vec::new();
            roots.push(self.to_runtime_node(
                *root,
                document,
                &Transform::new(),
                &mut materials,
                &mut path,
            )?);
        }
        let mut materials: Vec<(ObjectId, usize)> = materials
            .into_iter()
            .map(|(material, object)| (object, material))
            .collect();
        materials.sort_by_key(|(_, material)| *material);
        log::debug!(
            "instantiated {} root nodes and {} materials",
            roots.len(),
            materials.len()
        );
        Ok(RuntimeGraph { roots, materials })
    }

    fn to_runtime_node(
        &self,
        index: usize,
        document: &Document,
        parent: &Transform,
        materials: &mut HashMap<usize, ObjectId>,
        path: &mut Vec<usize>,
    ) -> anyhow::Result<RuntimeNode> {
        let node = document
            .nodes()
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("node {} does not exist", index))?;
        if path.contains(&index) {
            anyhow::bail!("node {} is its own ancestor", index);
        }
        path.push(index);

        let world_transform = parent * &node.transform;
        let object = self.spawn(RuntimeObject::Node {
            name: node.name.clone(),
        });
        let mesh = match node.mesh {
            Some(mesh) => Some(self.to_runtime_mesh(mesh, document, materials)?),
            None => None,
        };
        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            children.push(self.to_runtime_node(
                *child,
                document,
                &world_transform,
                materials,
                path,
            )?);
        }
        path.pop();

        Ok(RuntimeNode {
            object,
            source: Some(index),
            world_transform,
            mesh,
            children,
        })
    }

    fn to_runtime_mesh(
        &self,
        index: usize,
        document: &Document,
        materials: &mut HashMap<usize, ObjectId>,
    ) -> anyhow::Result<RuntimeMesh> {
        let mesh = document
            .meshes()
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("mesh {} does not exist", index))?;
        let object = self.spawn(RuntimeObject::Mesh);
        let mut primitives = Vec::with_capacity(mesh.primitives.len());
        for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
            let source = PrimitiveRef::new(index, primitive_index);
            let material_index = primitive
                .material
                .ok_or_else(|| anyhow::anyhow!("primitive {} has no material", source))?;
            let material = match materials.get(&material_index) {
                Some(material) => *material,
                None => {
                    let definition = document.material(material_index).ok_or_else(|| {
                        anyhow::anyhow!(
                            "primitive {} uses material {} which does not exist",
                            source,
                            material_index
                        )
                    })?;
                    let material = self.spawn(RuntimeObject::Material(definition.into()));
                    materials.insert(material_index, material);
                    material
                }
            };
            let object = self.spawn(RuntimeObject::Primitive { source, material });
            primitives.push(RuntimePrimitive {
                object,
                source,
                material,
            });
        }
        Ok(RuntimeMesh {
            object,
            source: index,
            primitives,
        })
    }

    /// Engine-side state of a material object.
    pub fn material(&self, material: ObjectId) -> Option<MaterialInstance> {
        match self.objects.read().get(&material) {
            Some(RuntimeObject::Material(instance)) => Some(instance.clone()),
            _ => None,
        }
    }

    /// Name of a node object.
    pub fn node_name(&self, node: ObjectId) -> Option<String> {
        match self.objects.read().get(&node) {
            Some(RuntimeObject::Node { name }) => name.clone(),
            _ => None,
        }
    }

    /// Every primitive object with the material object bound to it, ordered by object id.
    pub fn bindings(&self) -> Vec<(ObjectId, PrimitiveRef, ObjectId)> {
        let mut bindings: Vec<_> = self
            .objects
            .read()
            .iter()
            .filter_map(|(id, object)| match object {
                RuntimeObject::Primitive { source, material } => Some((*id, *source, *material)),
                _ => None,
            })
            .collect();
        bindings.sort_by_key(|(id, _, _)| *id);
        bindings
    }

    pub fn material_count(&self) -> usize {
        self.objects
            .read()
            .values()
            .filter(|object| matches!(object, RuntimeObject::Material(_)))
            .count()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Context {
    fn instantiate_material<'a>(
        &'a self,
        definition: &'a MaterialDefinition,
    ) -> BoxFuture<'a, anyhow::Result<ObjectId>> {
        Box::pin(async move {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            Ok(self.spawn(RuntimeObject::Material(definition.into())))
        })
    }

    fn bound_material(&self, primitive: ObjectId) -> Option<ObjectId> {
        match self.objects.read().get(&primitive) {
            Some(RuntimeObject::Primitive { material, .. }) => Some(*material),
            _ => None,
        }
    }

    fn bind_material(&self, primitive: ObjectId, material: ObjectId) -> anyhow::Result<()> {
        let mut objects = self.objects.write();
        if !matches!(objects.get(&material), Some(RuntimeObject::Material(_))) {
            anyhow::bail!("{} is not a material object", material);
        }
        match objects.get_mut(&primitive) {
            Some(RuntimeObject::Primitive { material: slot, .. }) => {
                *slot = material;
                Ok(())
            }
            _ => anyhow::bail!("{} is not a primitive object", primitive),
        }
    }

    fn set_material_property(
        &self,
        material: ObjectId,
        property: MaterialProperty,
    ) -> anyhow::Result<()> {
        match self.objects.write().get_mut(&material) {
            Some(RuntimeObject::Material(instance)) => {
                instance.apply(property);
                Ok(())
            }
            _ => anyhow::bail!("{} is not a material object", material),
        }
    }
}
