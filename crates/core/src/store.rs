use async_trait::async_trait;
use tokio::fs;

use crate::{
    error::{Result, TubeforgeError},
    layout::OutputLayout,
    types::{AssetId, VideoAsset},
};

/// Keyed persistence for asset records. Every `put` replaces the whole record.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn get(&self, id: &AssetId) -> Result<Option<VideoAsset>>;

    async fn put(&self, id: &AssetId, asset: &VideoAsset) -> Result<()>;
}

/// One pretty-printed JSON file per asset under `metadata/`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    layout: OutputLayout,
}

impl JsonFileStore {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    /// Load a record, failing if it does not exist
    pub async fn load(&self, id: &AssetId) -> Result<VideoAsset> {
        self.get(id).await?.ok_or_else(|| TubeforgeError::AssetNotFound {
            id: id.to_string(),
        })
    }

    /// All stored records, oldest first.
    pub async fn list(&self) -> Result<Vec<VideoAsset>> {
        let dir = self.layout.metadata_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut assets = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.ends_with("_data.json") {
                continue;
            }
            let json_content = fs::read_to_string(entry.path()).await?;
            assets.push(serde_json::from_str::<VideoAsset>(&json_content)?);
        }

        assets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(assets)
    }
}

#[async_trait]
impl AssetStore for JsonFileStore {
    async fn get(&self, id: &AssetId) -> Result<Option<VideoAsset>> {
        let path = self.layout.record_path(id);
        let json_content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&json_content)?))
    }

    async fn put(&self, id: &AssetId, asset: &VideoAsset) -> Result<()> {
        let path = self.layout.record_path(id);
        let tmp = path.with_extension("json.tmp");
        let failed = |e: std::io::Error| TubeforgeError::WriteFailed {
            path: path.clone(),
            reason: e.to_string(),
        };

        fs::create_dir_all(self.layout.metadata_dir())
            .await
            .map_err(failed)?;

        let pretty_json = serde_json::to_string_pretty(asset)?;
        fs::write(&tmp, &pretty_json).await.map_err(failed)?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(failed(e));
        }
        Ok(())
    }
}
