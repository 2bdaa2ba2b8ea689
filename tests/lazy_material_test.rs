use std::{sync::Arc, time::Duration};

use cgmath::{Vector3, Vector4};
use flow_variants::{Context, Error, Model};
use gltf::material::AlphaMode;

use crate::common::test_utils::{
    TestEngine, init_logger, model_with_engine, yellow_red_document,
};

mod common;

#[tokio::test]
async fn ensure_loaded_instantiates_without_rebinding() {
    init_logger();
    let (model, engine) = model_with_engine(yellow_red_document());
    let red = model.material_by_name("Red").unwrap();
    let bindings = engine.ctx.bindings();

    red.ensure_loaded().await.expect("red loads");
    red.ensure_loaded().await.expect("loading twice is fine");

    assert!(red.is_loaded());
    assert_eq!(engine.instantiations("Red"), 1);
    assert_eq!(engine.ctx.bindings(), bindings);
    assert_eq!(model.active_variant(), None);

    // the switch reuses the object instead of instantiating again
    model.switch_variant(Some("Yellow Red")).await.unwrap();
    assert_eq!(engine.instantiations("Red"), 1);
}

#[tokio::test]
async fn setters_need_an_instantiated_material() {
    init_logger();
    let (model, engine) = model_with_engine(yellow_red_document());
    let red = model.material_by_name("Red").unwrap();

    assert!(matches!(
        red.set_metallic_factor(0.3),
        Err(Error::Dormant { material: 2 })
    ));
    assert_eq!(engine.total_instantiations(), 0);

    red.ensure_loaded().await.unwrap();
    red.set_base_color_factor(Vector4::new(0.5, 0.0, 0.0, 1.0))
        .unwrap();
    red.set_emissive_factor(Vector3::new(0.1, 0.0, 0.0)).unwrap();
    red.set_metallic_factor(0.3).unwrap();
    red.set_roughness_factor(0.8).unwrap();
    red.set_alpha_mode(AlphaMode::Mask, Some(0.5)).unwrap();
    red.set_double_sided(true).unwrap();

    let object = *red.correlated_objects().unwrap().first().unwrap();
    let instance = engine.ctx.material(object).expect("material object");
    assert_eq!(instance.base_color_factor, Vector4::new(0.5, 0.0, 0.0, 1.0));
    assert_eq!(instance.emissive_factor, Vector3::new(0.1, 0.0, 0.0));
    assert_eq!(instance.metallic_factor, 0.3);
    assert_eq!(instance.roughness_factor, 0.8);
    assert_eq!(instance.alpha_mode, AlphaMode::Mask);
    assert_eq!(instance.alpha_cutoff, Some(0.5));
    assert!(instance.double_sided);
    // the declarative side stays as loaded
    assert_eq!(red.definition().metallic_factor, 1.0);
}

#[tokio::test]
async fn facades_taken_before_a_switch_see_its_result() {
    init_logger();
    let (model, _) = model_with_engine(yellow_red_document());
    let red = model.materials()[2].clone();
    let shoe = model.node_by_name("Shoe").expect("node exists");
    let nodes = shoe.correlated_objects();

    model.switch_variant(Some("Yellow Red")).await.unwrap();

    assert!(red.is_loaded());
    assert_eq!(shoe.correlated_objects(), nodes);
    assert!(model.node_by_name("Boot").is_none());
}

fn slow_model() -> (Arc<Model>, Arc<TestEngine>) {
    let engine = Arc::new(TestEngine::new(Arc::new(Context::with_latency(
        Duration::from_millis(20),
    ))));
    let document = Arc::new(yellow_red_document());
    let graph = engine.ctx.instantiate_document(&document).unwrap();
    let model = Arc::new(Model::new(document, &graph, engine.clone()));
    (model, engine)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_switches_instantiate_once() {
    init_logger();
    let (model, engine) = slow_model();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let model = model.clone();
            tokio::spawn(async move { model.switch_variant(Some("Yellow Red")).await })
        })
        .collect();
    for handle in handles {
        handle.await.expect("task finished").expect("switch succeeded");
    }

    assert_eq!(engine.instantiations("Red"), 1);
    assert_eq!(engine.ctx.material_count(), 3);
    assert_eq!(model.active_variant().as_deref(), Some("Yellow Red"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_switches_end_in_a_consistent_state() {
    init_logger();
    let (model, engine) = slow_model();

    let handles: Vec<_> = ["Yellow Red", "Beach", "Yellow Red", "Beach", "Yellow Red"]
        .into_iter()
        .map(|variant| {
            let model = model.clone();
            tokio::spawn(async move { model.switch_variant(Some(variant)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let expected = match model.active_variant().as_deref() {
        Some("Yellow Red") => ["Red", "Yellow"],
        Some("Beach") => ["Sand", "Sand"],
        other => panic!("unexpected active variant {:?}", other),
    };
    let bound: Vec<_> = engine
        .ctx
        .bindings()
        .into_iter()
        .map(|(_, _, material)| engine.ctx.material(material).unwrap().name.unwrap())
        .collect();
    assert_eq!(bound, expected);
    assert_eq!(engine.instantiations("Red"), 1);
}

#[tokio::test]
async fn switch_and_explicit_load_share_the_lock() {
    init_logger();
    let (model, engine) = slow_model();
    let red = model.materials()[2].clone();

    let (switched, loaded) = futures::join!(
        model.switch_variant(Some("Yellow Red")),
        red.ensure_loaded()
    );

    switched.unwrap();
    loaded.unwrap();
    assert_eq!(engine.instantiations("Red"), 1);
}
