//! The model: facades for one loaded asset and the variant switch protocol.
//!
//! A [`Model`] is built once, when an asset finished loading, from the parsed
//! [`Document`] and the [`RuntimeGraph`] the engine instantiated from it. Materials
//! the original bindings use are correlated right away; every other material stays
//! dormant until a variant (or [`MaterialFacade::ensure_loaded`]) needs it.
//!
//! Switching variants runs in three phases while the model's switch lock is held:
//!
//! 1. resolve the batch and check every material index against the document,
//! 2. instantiate the dormant materials the batch needs, at most once each,
//! 3. rebind the primitive objects and commit the active variant.
//!
//! Phase 3 only starts once phase 2 succeeded completely, so a failing
//! instantiation never leaves a half-switched model behind. Materials instantiated
//! before the failure stay correlated: they are not bound anywhere yet, and dropping
//! them would mean instantiating them a second time later on.

use std::{collections::HashMap, sync::Arc};

use futures_intrusive::sync::Mutex;
use instant::Instant;
use parking_lot::RwLock;

use crate::{
    context::Engine,
    data_structures::{
        correlation::{CorrelationTable, ObjectSet},
        document::{Document, Element, MaterialDefinition},
        facade::{ElementFacade, MaterialFacade, PrimitiveFacade},
        scene_graph::{ObjectId, RuntimeGraph},
        variants::{Substitution, Target, VariantDirectory},
    },
    error::{Error, Result},
};

/// Correlation state of one material.
#[derive(Clone, Debug, PartialEq)]
pub enum Correlation {
    /// Instantiated; the objects are the ones the correlation table holds.
    Active(ObjectSet),
    /// Known from the document but not instantiated yet.
    Dormant(MaterialDefinition),
}

pub(crate) struct State {
    pub(crate) table: CorrelationTable,
    pub(crate) materials: Vec<Correlation>,
    pub(crate) active_variant: Option<String>,
    /// Material object of every primitive object, as of the last load or bind.
    pub(crate) bindings: HashMap<ObjectId, ObjectId>,
}

/// Everything facades of one model share.
pub(crate) struct Shared {
    pub(crate) document: Arc<Document>,
    pub(crate) engine: Arc<dyn Engine>,
    pub(crate) state: RwLock<State>,
    /// Held for the whole of a switch (or explicit load); fair, so callers queue up.
    pub(crate) switch_lock: Mutex<()>,
}

impl Shared {
    pub(crate) fn correlation(&self, material: usize) -> Option<Correlation> {
        self.state.read().materials.get(material).cloned()
    }

    /// Makes `material` active, instantiating it if it is dormant.
    ///
    /// Callers must hold `switch_lock`.
    pub(crate) async fn materialize(&self, material: usize) -> Result<ObjectSet> {
        let definition = match self.correlation(material) {
            Some(Correlation::Active(objects)) => return Ok(objects),
            Some(Correlation::Dormant(definition)) => definition,
            None => {
                return Err(Error::Instantiation {
                    material,
                    name: None,
                    source: anyhow::anyhow!("the document has no material {}", material),
                });
            }
        };

        let started = Instant::now();
        let object = self
            .engine
            .instantiate_material(&definition)
            .await
            .map_err(|source| Error::Instantiation {
                material,
                name: definition.name.clone(),
                source,
            })?;

        let mut state = self.state.write();
        let objects = state
            .table
            .insert(Element::Material(material), [object].into())?;
        state.materials[material] = Correlation::Active(objects.clone());
        log::info!(
            "instantiated material {} ({:?}) as {} in {:?}",
            material,
            definition.name,
            object,
            started.elapsed()
        );
        Ok(objects)
    }
}

/// Facades of one loaded asset plus its variants.
pub struct Model {
    shared: Arc<Shared>,
    variants: VariantDirectory,
    materials: Vec<MaterialFacade>,
    meshes: Vec<ElementFacade>,
    nodes: Vec<ElementFacade>,
    primitives: Vec<PrimitiveFacade>,
}

impl Model {
    pub fn new(document: Arc<Document>, graph: &RuntimeGraph, engine: Arc<dyn Engine>) -> Self {
        let table = CorrelationTable::from_graph(graph);
        let variants = VariantDirectory::from_document(&document);

        let correlations: Vec<Correlation> = document
            .materials()
            .iter()
            .enumerate()
            .map(|(index, definition)| match table.get(&Element::Material(index)) {
                Some(objects) => Correlation::Active(objects.clone()),
                None => Correlation::Dormant(definition.clone()),
            })
            .collect();
        for (object, material) in &graph.materials {
            if *material >= correlations.len() {
                log::warn!(
                    "runtime material {} claims to come from material {}, which the document doesn't define",
                    object,
                    material
                );
            }
        }
        log::debug!(
            "correlated {} elements, {} of {} materials dormant, {} variants",
            table.len(),
            correlations
                .iter()
                .filter(|c| matches!(c, Correlation::Dormant(_)))
                .count(),
            correlations.len(),
            variants.names().len()
        );

        let bindings = graph
            .primitives()
            .into_iter()
            .map(|primitive| (primitive.object, primitive.material))
            .collect();

        let shared = Arc::new(Shared {
            document: document.clone(),
            engine,
            state: RwLock::new(State {
                table,
                materials: correlations,
                active_variant: None,
                bindings,
            }),
            switch_lock: Mutex::new((), true),
        });

        let materials = (0..document.materials().len())
            .map(|index| MaterialFacade::new(index, shared.clone()))
            .collect();
        let meshes = document
            .meshes()
            .iter()
            .enumerate()
            .map(|(index, mesh)| {
                ElementFacade::new(Element::Mesh(index), mesh.name.clone(), shared.clone())
            })
            .collect();
        let nodes = document
            .nodes()
            .iter()
            .enumerate()
            .map(|(index, node)| {
                ElementFacade::new(Element::Node(index), node.name.clone(), shared.clone())
            })
            .collect();
        let primitives = document
            .primitives()
            .map(|(primitive, _)| PrimitiveFacade::new(primitive, shared.clone()))
            .collect();

        Self {
            shared,
            variants,
            materials,
            meshes,
            nodes,
            primitives,
        }
    }

    /// Materials in document order; indices never change.
    pub fn materials(&self) -> &[MaterialFacade] {
        &self.materials
    }

    pub fn material_by_name(&self, name: &str) -> Option<MaterialFacade> {
        self.materials
            .iter()
            .find(|material| material.name() == Some(name))
            .cloned()
    }

    pub fn meshes(&self) -> &[ElementFacade] {
        &self.meshes
    }

    pub fn nodes(&self) -> &[ElementFacade] {
        &self.nodes
    }

    pub fn node_by_name(&self, name: &str) -> Option<ElementFacade> {
        self.nodes
            .iter()
            .find(|node| node.name() == Some(name))
            .cloned()
    }

    /// Primitives in document order.
    pub fn primitives(&self) -> &[PrimitiveFacade] {
        &self.primitives
    }

    /// Variant names in document order.
    pub fn variants(&self) -> &[String] {
        self.variants.names()
    }

    pub fn has_variant(&self, name: &str) -> bool {
        self.variants.contains(name)
    }

    /// The variant of the last successful switch; `None` while the original bindings are in place.
    pub fn active_variant(&self) -> Option<String> {
        self.shared.state.read().active_variant.clone()
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.shared.document
    }

    /// Runs `inspect` against the current correlation table.
    pub fn with_correlation<R>(&self, inspect: impl FnOnce(&CorrelationTable) -> R) -> R {
        inspect(&self.shared.state.read().table)
    }

    /// Switches to the variant `name`, or back to the original bindings for `None` (or
    /// the document's designated default variant).
    ///
    /// Unknown names, assets without variants and switching to the already active
    /// variant succeed without touching anything. Overlapping calls run one after the
    /// other in call order.
    pub async fn switch_variant(&self, name: Option<&str>) -> Result<()> {
        let _guard = self.shared.switch_lock.lock().await;

        let Some(target) = self.variants.target(name) else {
            log::debug!("no variant {:?} to switch to, ignoring", name);
            return Ok(());
        };
        if self.shared.state.read().active_variant.as_deref() == target.name() {
            log::debug!("variant {:?} is already active", target.name());
            return Ok(());
        }

        let batch = self.variants.resolve(&target);
        self.validate(&target, &batch)?;
        let materials = self.materialize_batch(&batch).await?;
        self.bind(&batch, &materials)?;

        self.shared.state.write().active_variant = target.name().map(str::to_string);
        log::debug!(
            "switched to {:?} ({} substitutions)",
            target.name(),
            batch.len()
        );
        Ok(())
    }

    fn validate(&self, target: &Target, batch: &[Substitution]) -> Result<()> {
        let available = self.materials.len();
        match batch.iter().find(|s| s.material >= available) {
            Some(invalid) => Err(Error::InvalidVariantDefinition {
                variant: target.name().map(str::to_string),
                primitive: invalid.primitive,
                material: invalid.material,
                available,
            }),
            None => Ok(()),
        }
    }

    /// Material object to bind for every material of the batch.
    async fn materialize_batch(&self, batch: &[Substitution]) -> Result<HashMap<usize, ObjectId>> {
        let mut objects = HashMap::new();
        for substitution in batch {
            if objects.contains_key(&substitution.material) {
                continue;
            }
            let set = self.shared.materialize(substitution.material).await?;
            let object = set.first().copied().ok_or(Error::EmptyCorrelation {
                element: Element::Material(substitution.material),
            })?;
            objects.insert(substitution.material, object);
        }
        Ok(objects)
    }

    fn bind(&self, batch: &[Substitution], materials: &HashMap<usize, ObjectId>) -> Result<()> {
        let engine = &self.shared.engine;
        let mut bindings = self.shared.state.read().bindings.clone();
        // (primitive object, material object it had before)
        let mut applied: Vec<(ObjectId, ObjectId)> = Vec::new();
        for substitution in batch {
            let Some(&material) = materials.get(&substitution.material) else {
                continue;
            };
            let primitives = self
                .shared
                .state
                .read()
                .table
                .get(&Element::Primitive(substitution.primitive))
                .cloned();
            // not part of the instantiated scene
            let Some(primitives) = primitives else {
                continue;
            };
            for primitive in primitives.iter().copied() {
                let previous = bindings
                    .get(&primitive)
                    .copied()
                    .or_else(|| engine.bound_material(primitive));
                if previous == Some(material) {
                    continue;
                }
                let Some(previous) = previous else {
                    self.rollback(&applied);
                    return Err(Error::Binding {
                        primitive,
                        material,
                        source: anyhow::anyhow!("current material of {} is unknown", primitive),
                    });
                };
                if let Err(source) = engine.bind_material(primitive, material) {
                    self.rollback(&applied);
                    return Err(Error::Binding {
                        primitive,
                        material,
                        source,
                    });
                }
                applied.push((primitive, previous));
                bindings.insert(primitive, material);
            }
        }
        self.shared.state.write().bindings = bindings;
        Ok(())
    }

    fn rollback(&self, applied: &[(ObjectId, ObjectId)]) {
        for (primitive, previous) in applied.iter().rev() {
            if let Err(e) = self.shared.engine.bind_material(*primitive, *previous) {
                log::error!(
                    "could not restore material {} on primitive {}: {}",
                    previous,
                    primitive,
                    e
                );
            }
        }
    }
}
