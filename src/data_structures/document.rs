//! The declarative side: an already parsed asset document.
//!
//! A [`Document`] is what the asset file *says*: ordered material definitions,
//! meshes with their primitives and per-variant material mappings, the node
//! hierarchy and the variant names. It never changes after loading; the runtime
//! objects an engine creates from it are tracked elsewhere.

use std::fmt;

use gltf::material::AlphaMode;

use crate::data_structures::transform::Transform;

/// Name of the material synthesized for primitives without an explicit material.
pub const DEFAULT_MATERIAL_NAME: &str = "Default";

/// Addresses one primitive: `primitive` within mesh `mesh`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveRef {
    pub mesh: usize,
    pub primitive: usize,
}

impl PrimitiveRef {
    pub fn new(mesh: usize, primitive: usize) -> Self {
        Self { mesh, primitive }
    }
}

impl fmt::Display for PrimitiveRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.mesh, self.primitive)
    }
}

/// Value identity of one declarative element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    Material(usize),
    Mesh(usize),
    Primitive(PrimitiveRef),
    Node(usize),
}

/// Raw definition of a material, as written in the document.
///
/// This is also the "lazy load info" of a dormant material: the engine gets handed
/// exactly this when the material is instantiated on first use.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDefinition {
    pub name: Option<String>,
    pub base_color_factor: cgmath::Vector4<f32>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: cgmath::Vector3<f32>,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: Option<f32>,
    pub double_sided: bool,
    pub base_color_texture: Option<usize>,
    pub normal_texture: Option<usize>,
}

impl MaterialDefinition {
    /// A material with the glTF default factors.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_base_color(mut self, color: impl Into<cgmath::Vector4<f32>>) -> Self {
        self.base_color_factor = color.into();
        self
    }
}

impl Default for MaterialDefinition {
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: cgmath::Vector4::new(1.0, 1.0, 1.0, 1.0),
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: cgmath::Vector3::new(0.0, 0.0, 0.0),
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: None,
            double_sided: false,
            base_color_texture: None,
            normal_texture: None,
        }
    }
}

/// `material` replaces the primitive's material while any of `variants` is active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantMapping {
    pub material: usize,
    pub variants: Vec<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrimitiveDefinition {
    /// Material of the original (default) binding.
    pub material: Option<usize>,
    pub mappings: Vec<VariantMapping>,
}

impl PrimitiveDefinition {
    pub fn new(material: Option<usize>) -> Self {
        Self {
            material,
            mappings: Vec::new(),
        }
    }

    pub fn with_mapping(mut self, material: usize, variants: Vec<usize>) -> Self {
        self.mappings.push(VariantMapping { material, variants });
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeshDefinition {
    pub name: Option<String>,
    pub primitives: Vec<PrimitiveDefinition>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeDefinition {
    pub name: Option<String>,
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
    pub transform: Transform,
}

/// An already parsed asset document.
#[derive(Clone, Debug, Default)]
pub struct Document {
    materials: Vec<MaterialDefinition>,
    meshes: Vec<MeshDefinition>,
    nodes: Vec<NodeDefinition>,
    roots: Vec<usize>,
    variants: Vec<String>,
    default_variant: Option<String>,
}

impl Document {
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::default()
    }

    /// Converts a parsed glTF document, including its `KHR_materials_variants` data.
    pub fn from_gltf(gltf: &gltf::Document) -> Self {
        let mut builder = Self::builder();
        for material in gltf.materials() {
            let pbr = material.pbr_metallic_roughness();
            builder.material(MaterialDefinition {
                name: material.name().map(str::to_string),
                base_color_factor: pbr.base_color_factor().into(),
                metallic_factor: pbr.metallic_factor(),
                roughness_factor: pbr.roughness_factor(),
                emissive_factor: material.emissive_factor().into(),
                alpha_mode: material.alpha_mode(),
                alpha_cutoff: material.alpha_cutoff(),
                double_sided: material.double_sided(),
                base_color_texture: pbr.base_color_texture().map(|info| info.texture().index()),
                normal_texture: material.normal_texture().map(|info| info.texture().index()),
            });
        }
        for mesh in gltf.meshes() {
            let primitives = mesh
                .primitives()
                .map(|primitive| PrimitiveDefinition {
                    material: primitive.material().index(),
                    mappings: primitive
                        .mappings()
                        .filter_map(|mapping| {
                            let Some(material) = mapping.material().index() else {
                                log::warn!(
                                    "mesh {} maps primitive {} to a material without index, ignoring it",
                                    mesh.index(),
                                    primitive.index()
                                );
                                return None;
                            };
                            Some(VariantMapping {
                                material,
                                variants: mapping.variants().iter().map(|v| *v as usize).collect(),
                            })
                        })
                        .collect(),
                })
                .collect();
            builder.mesh(MeshDefinition {
                name: mesh.name().map(str::to_string),
                primitives,
            });
        }
        for node in gltf.nodes() {
            builder.node(NodeDefinition {
                name: node.name().map(str::to_string),
                mesh: node.mesh().map(|mesh| mesh.index()),
                children: node.children().map(|child| child.index()).collect(),
                transform: node.transform().decomposed().into(),
            });
        }
        let scene = gltf.default_scene().or_else(|| gltf.scenes().next());
        if let Some(scene) = scene {
            for node in scene.nodes() {
                builder.root(node.index());
            }
        }
        if let Some(variants) = gltf.variants() {
            for variant in variants {
                builder.variant(variant.name());
            }
        }
        builder.build()
    }

    pub fn materials(&self) -> &[MaterialDefinition] {
        &self.materials
    }

    pub fn material(&self, index: usize) -> Option<&MaterialDefinition> {
        self.materials.get(index)
    }

    pub fn meshes(&self) -> &[MeshDefinition] {
        &self.meshes
    }

    pub fn nodes(&self) -> &[NodeDefinition] {
        &self.nodes
    }

    /// Nodes of the scene that gets instantiated.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Variant names; mapping entries refer to them by position.
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Name of the variant that stands for the original bindings, if the asset designates one.
    pub fn default_variant(&self) -> Option<&str> {
        self.default_variant.as_deref()
    }

    pub fn set_default_variant(&mut self, name: Option<String>) {
        self.default_variant = name;
    }

    pub fn primitive(&self, primitive: PrimitiveRef) -> Option<&PrimitiveDefinition> {
        self.meshes
            .get(primitive.mesh)
            .and_then(|mesh| mesh.primitives.get(primitive.primitive))
    }

    /// All primitives in document order.
    pub fn primitives(&self) -> impl Iterator<Item = (PrimitiveRef, &PrimitiveDefinition)> {
        self.meshes.iter().enumerate().flat_map(|(mesh, definition)| {
            definition
                .primitives
                .iter()
                .enumerate()
                .map(move |(primitive, p)| (PrimitiveRef::new(mesh, primitive), p))
        })
    }

    /// Material of the primitive's original binding.
    pub fn original_material(&self, primitive: PrimitiveRef) -> Option<usize> {
        self.primitive(primitive).and_then(|p| p.material)
    }

    /// Primitives without a material, or a document without any material at all, get one
    /// shared material named [`DEFAULT_MATERIAL_NAME`].
    fn ensure_default_material(&mut self) {
        let unassigned = self
            .meshes
            .iter()
            .flat_map(|mesh| mesh.primitives.iter())
            .any(|primitive| primitive.material.is_none());
        if !unassigned && !self.materials.is_empty() {
            return;
        }
        let index = self.materials.len();
        self.materials
            .push(MaterialDefinition::named(DEFAULT_MATERIAL_NAME));
        self.meshes
            .iter_mut()
            .flat_map(|mesh| mesh.primitives.iter_mut())
            .filter(|primitive| primitive.material.is_none())
            .for_each(|primitive| primitive.material = Some(index));
        log::debug!("synthesized default material at index {}", index);
    }
}

/// Assembles a [`Document`] piece by piece; `build` applies default materialization.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    pub fn material(&mut self, material: MaterialDefinition) -> usize {
        self.document.materials.push(material);
        self.document.materials.len() - 1
    }

    pub fn mesh(&mut self, mesh: MeshDefinition) -> usize {
        self.document.meshes.push(mesh);
        self.document.meshes.len() - 1
    }

    pub fn node(&mut self, node: NodeDefinition) -> usize {
        self.document.nodes.push(node);
        self.document.nodes.len() - 1
    }

    pub fn root(&mut self, node: usize) -> &mut Self {
        self.document.roots.push(node);
        self
    }

    pub fn variant(&mut self, name: impl Into<String>) -> usize {
        self.document.variants.push(name.into());
        self.document.variants.len() - 1
    }

    pub fn default_variant(&mut self, name: impl Into<String>) -> &mut Self {
        self.document.default_variant = Some(name.into());
        self
    }

    pub fn build(self) -> Document {
        let mut document = self.document;
        if document.roots.is_empty() {
            // No scene: every node nobody claims as a child is a root.
            let children: Vec<usize> = document
                .nodes
                .iter()
                .flat_map(|node| node.children.iter().copied())
                .collect();
            document.roots = (0..document.nodes.len())
                .filter(|node| !children.contains(node))
                .collect();
        }
        document.ensure_default_material();
        document
    }
}
