use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0002_upload_state")
        .depends_on(&["0001_videos"])
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "ALTER TABLE videos ADD COLUMN uploaded_to_object_store INTEGER NOT NULL DEFAULT 0",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "ALTER TABLE videos ADD COLUMN object_store_url TEXT",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "ALTER TABLE videos ADD COLUMN uploaded_to_cms INTEGER NOT NULL DEFAULT 0",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "ALTER TABLE videos ADD COLUMN cms_token TEXT",
        ))
        // Pending CMS uploads are selected newest first.
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_videos_uploaded ON videos(uploaded_to_cms, posted_at)",
        ))
}
