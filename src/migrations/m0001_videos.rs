use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_videos")
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE videos (
    post_id TEXT PRIMARY KEY NOT NULL,
    generation_id TEXT NOT NULL DEFAULT '',
    video_url TEXT NOT NULL,
    thumbnail_url TEXT NOT NULL DEFAULT '',
    text TEXT NOT NULL DEFAULT '',
    username TEXT NOT NULL DEFAULT '',
    user_id TEXT NOT NULL DEFAULT '',
    posted_at REAL NOT NULL DEFAULT 0,
    width INTEGER NOT NULL DEFAULT 0,
    height INTEGER NOT NULL DEFAULT 0,
    downloaded_at TEXT NOT NULL,
    local_video_path TEXT NOT NULL,
    local_thumbnail_path TEXT NOT NULL DEFAULT ''
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_videos_posted_at ON videos(posted_at)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_videos_username ON videos(username)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_videos_downloaded_at ON videos(downloaded_at)",
        ))
}
