use std::{env, path::PathBuf, sync::Arc};

use crate::{
    context::Context,
    data_structures::{document::Document, model::Model},
};

/**
 * This module contains all logic for loading asset documents from external files.
 */
pub mod file;

pub use file::load_binary;

/// Asset root used when nothing else is configured.
pub const DEFAULT_ASSET_ROOT: &str = "./assets";
pub const ASSET_ROOT_ENV: &str = "FLOW_VARIANTS_ASSET_ROOT";
pub const DEFAULT_VARIANT_ENV: &str = "FLOW_VARIANTS_DEFAULT_VARIANT";

#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Directory file names are resolved against.
    pub asset_root: PathBuf,
    /// Variant name that stands for the original material bindings. glTF has no
    /// notion of it, so it can only be configured.
    pub default_variant: Option<String>,
}

impl LoadOptions {
    /// Defaults, overridden by `FLOW_VARIANTS_ASSET_ROOT` and `FLOW_VARIANTS_DEFAULT_VARIANT`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(root) = env::var(ASSET_ROOT_ENV) {
            options.asset_root = root.into();
        }
        if let Ok(variant) = env::var(DEFAULT_VARIANT_ENV) {
            options.default_variant = Some(variant);
        }
        options
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from(DEFAULT_ASSET_ROOT),
            default_variant: None,
        }
    }
}

/// Parses `.gltf` or `.glb` bytes into a [`Document`].
pub fn parse_document(data: &[u8], options: &LoadOptions) -> anyhow::Result<Document> {
    let gltf = gltf::Gltf::from_slice(data)?;
    let mut document = Document::from_gltf(&gltf);
    if let Some(variant) = &options.default_variant {
        if !document.variants().contains(variant) {
            log::warn!(
                "configured default variant {:?} is not defined by the asset",
                variant
            );
        }
        document.set_default_variant(Some(variant.clone()));
    }
    Ok(document)
}

pub async fn load_document(file_name: &str, options: &LoadOptions) -> anyhow::Result<Document> {
    let data = load_binary(file_name, options).await?;
    let document = parse_document(&data, options)
        .map_err(|e| anyhow::anyhow!("could not parse {}: {}", file_name, e))?;
    log::debug!(
        "loaded {}: {} materials, {} meshes, {} variants",
        file_name,
        document.materials().len(),
        document.meshes().len(),
        document.variants().len()
    );
    Ok(document)
}

/// Loads `file_name`, instantiates its original bindings in `ctx` and correlates both.
pub async fn load_model(
    file_name: &str,
    options: &LoadOptions,
    ctx: Arc<Context>,
) -> anyhow::Result<Model> {
    let document = Arc::new(load_document(file_name, options).await?);
    let graph = ctx.instantiate_document(&document)?;
    Ok(Model::new(document, &graph, ctx))
}
