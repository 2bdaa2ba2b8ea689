use std::path::PathBuf;

use crate::resources::LoadOptions;

fn asset_path(file_name: &str, options: &LoadOptions) -> PathBuf {
    options.asset_root.join(file_name)
}

pub async fn load_binary(file_name: &str, options: &LoadOptions) -> anyhow::Result<Vec<u8>> {
    let path = asset_path(file_name, options);
    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| anyhow::anyhow!("could not read {}: {}", path.display(), e))?;
    Ok(data)
}
