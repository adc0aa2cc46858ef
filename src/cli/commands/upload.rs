//! Upload pipeline commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use socrawler::config::Settings;
use socrawler::repository::ItemRepository;
use socrawler::services::cms::{CmsClient, CmsUploader};
use socrawler::services::object_store::{ObjectStoreUploader, S3ObjectStore};

use crate::cli::helpers::{open_repository, print_stage};

fn object_store_uploader(
    settings: &Settings,
    repo: &ItemRepository,
) -> anyhow::Result<ObjectStoreUploader> {
    let store = S3ObjectStore::new(settings.object_store.clone())
        .context("Object store is not configured")?;
    Ok(ObjectStoreUploader::new(
        Arc::new(store),
        repo.clone(),
        &settings.object_store.key_prefix,
    ))
}

/// Upload every stored video that is not yet in the object store.
pub async fn cmd_upload_object_store(settings: &Settings, limit: usize) -> anyhow::Result<()> {
    let repo = open_repository(settings).await?;
    let uploader = object_store_uploader(settings, &repo)?;

    let result = uploader
        .upload_pending(limit)
        .await
        .context("Failed to list pending items")?;
    print_stage("Object store upload", &result);
    Ok(())
}

/// Publish every stored video the CMS has not accepted yet.
pub async fn cmd_upload_cms(settings: &Settings, limit: usize) -> anyhow::Result<()> {
    let repo = open_repository(settings).await?;
    let object_store = object_store_uploader(settings, &repo)?;
    let client = CmsClient::new(&settings.cms).context("CMS is not configured")?;

    let uploader = CmsUploader::new(
        client,
        object_store,
        repo,
        Duration::from_millis(settings.cms.delay_ms),
    );
    let result = uploader
        .upload_pending(limit)
        .await
        .context("Failed to list pending items")?;
    print_stage("CMS upload", &result);
    Ok(())
}
