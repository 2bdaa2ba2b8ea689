use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use cgmath::Vector4;
use flow_variants::{
    Context, Document, Engine, MaterialDefinition, MaterialProperty, Model, ObjectId, PrimitiveRef,
    data_structures::document::{MeshDefinition, NodeDefinition, PrimitiveDefinition},
};
use futures::future::BoxFuture;
use parking_lot::Mutex;

pub const SHOE: &str = "shoe_variants.gltf";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Wraps a [`Context`], counts material instantiations per material name and fails on request.
pub(crate) struct TestEngine {
    pub ctx: Arc<Context>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    instantiations: HashMap<Option<String>, u32>,
    failing_materials: HashSet<String>,
    failing_bind: Option<u32>,
    bind_invocations: u32,
    hide_bindings: bool,
}

impl TestEngine {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self {
            ctx,
            state: Mutex::new(State::default()),
        }
    }

    /// Instantiating a material named `name` fails from now on.
    pub fn fail_material(&self, name: &str) {
        self.state.lock().failing_materials.insert(name.to_string());
    }

    pub fn heal_material(&self, name: &str) {
        self.state.lock().failing_materials.remove(name);
    }

    /// Lets the first `succeeding` binds from now on pass and rejects the one after them, once.
    pub fn fail_bind_after(&self, succeeding: u32) {
        let mut state = self.state.lock();
        state.failing_bind = Some(state.bind_invocations + succeeding);
    }

    /// Makes `bound_material` answer `None`, like engines that can't read bindings back.
    pub fn hide_bindings(&self) {
        self.state.lock().hide_bindings = true;
    }

    pub fn bind_invocations(&self) -> u32 {
        self.state.lock().bind_invocations
    }

    pub fn instantiations(&self, name: &str) -> u32 {
        self.state
            .lock()
            .instantiations
            .get(&Some(name.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_instantiations(&self) -> u32 {
        self.state.lock().instantiations.values().sum()
    }
}

impl Engine for TestEngine {
    fn instantiate_material<'a>(
        &'a self,
        definition: &'a MaterialDefinition,
    ) -> BoxFuture<'a, anyhow::Result<ObjectId>> {
        Box::pin(async move {
            {
                let mut state = self.state.lock();
                if let Some(name) = &definition.name {
                    if state.failing_materials.contains(name) {
                        anyhow::bail!("refusing to instantiate {}", name);
                    }
                }
                *state
                    .instantiations
                    .entry(definition.name.clone())
                    .or_default() += 1;
            }
            self.ctx.instantiate_material(definition).await
        })
    }

    fn bound_material(&self, primitive: ObjectId) -> Option<ObjectId> {
        if self.state.lock().hide_bindings {
            return None;
        }
        self.ctx.bound_material(primitive)
    }

    fn bind_material(&self, primitive: ObjectId, material: ObjectId) -> anyhow::Result<()> {
        {
            let mut state = self.state.lock();
            let invocation = state.bind_invocations;
            state.bind_invocations += 1;
            if state.failing_bind == Some(invocation) {
                state.failing_bind = None;
                anyhow::bail!("bind of {} to {} rejected", material, primitive);
            }
        }
        self.ctx.bind_material(primitive, material)
    }

    fn set_material_property(
        &self,
        material: ObjectId,
        property: MaterialProperty,
    ) -> anyhow::Result<()> {
        self.ctx.set_material_property(material, property)
    }
}

/// Builds a model for `document` whose engine is a fresh [`TestEngine`].
pub(crate) fn model_with_engine(document: Document) -> (Model, Arc<TestEngine>) {
    let engine = Arc::new(TestEngine::new(Arc::new(Context::new())));
    let document = Arc::new(document);
    let graph = engine
        .ctx
        .instantiate_document(&document)
        .expect("document instantiates");
    let model = Model::new(document, &graph, engine.clone());
    (model, engine)
}

/// Three materials; "Red" is only used by variant "Yellow Red".
///
/// | primitive | original | "Yellow Red" | "Beach" |
/// |-----------|----------|--------------|---------|
/// | 0/0       | Yellow   | Red          | Sand    |
/// | 0/1       | Sand     | Yellow       | -       |
pub fn yellow_red_document() -> Document {
    let mut builder = Document::builder();
    let yellow = builder.material(
        MaterialDefinition::named("Yellow").with_base_color(Vector4::new(1.0, 1.0, 0.0, 1.0)),
    );
    let sand = builder.material(
        MaterialDefinition::named("Sand").with_base_color(Vector4::new(0.8, 0.7, 0.5, 1.0)),
    );
    let red = builder.material(
        MaterialDefinition::named("Red").with_base_color(Vector4::new(1.0, 0.0, 0.0, 1.0)),
    );
    let yellow_red = builder.variant("Yellow Red");
    let beach = builder.variant("Beach");
    let mesh = builder.mesh(MeshDefinition {
        name: Some("Shoe".into()),
        primitives: vec![
            PrimitiveDefinition::new(Some(yellow))
                .with_mapping(red, vec![yellow_red])
                .with_mapping(sand, vec![beach]),
            PrimitiveDefinition::new(Some(sand)).with_mapping(yellow, vec![yellow_red]),
        ],
    });
    builder.node(NodeDefinition {
        name: Some("Shoe".into()),
        mesh: Some(mesh),
        ..Default::default()
    });
    builder.build()
}

/// One mesh without any material and without variants.
pub fn untextured_document() -> Document {
    let mut builder = Document::builder();
    let mesh = builder.mesh(MeshDefinition {
        name: Some("Cube".into()),
        primitives: vec![PrimitiveDefinition::new(None), PrimitiveDefinition::new(None)],
    });
    builder.node(NodeDefinition {
        name: Some("Cube".into()),
        mesh: Some(mesh),
        ..Default::default()
    });
    builder.build()
}

/// Like [`yellow_red_document`], but variant "Broken" points at a material that doesn't exist.
pub fn broken_variant_document() -> Document {
    let mut builder = Document::builder();
    let yellow = builder.material(MaterialDefinition::named("Yellow"));
    let red = builder.material(MaterialDefinition::named("Red"));
    let broken = builder.variant("Broken");
    let mesh = builder.mesh(MeshDefinition {
        name: None,
        primitives: vec![
            PrimitiveDefinition::new(Some(yellow)).with_mapping(red, vec![broken]),
            PrimitiveDefinition::new(Some(yellow)).with_mapping(42, vec![broken]),
        ],
    });
    builder.node(NodeDefinition {
        mesh: Some(mesh),
        ..Default::default()
    });
    builder.build()
}

/// `(primitive, bound material name)` for every primitive object, ordered by object id.
pub fn bound_names(ctx: &Context) -> Vec<(PrimitiveRef, Option<String>)> {
    ctx.bindings()
        .into_iter()
        .map(|(_, primitive, material)| {
            (
                primitive,
                ctx.material(material).and_then(|instance| instance.name),
            )
        })
        .collect()
}

pub fn named(pairs: &[(PrimitiveRef, &str)]) -> Vec<(PrimitiveRef, Option<String>)> {
    pairs
        .iter()
        .map(|(primitive, name)| (*primitive, Some(name.to_string())))
        .collect()
}
