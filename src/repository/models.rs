//! Diesel ORM models for database tables.

use diesel::prelude::*;

use crate::schema;

/// Video record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::videos)]
#[diesel(primary_key(post_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct VideoRecord {
    pub post_id: String,
    pub generation_id: String,
    pub video_url: String,
    pub thumbnail_url: String,
    pub text: String,
    pub username: String,
    pub user_id: String,
    pub posted_at: f64,
    pub width: i32,
    pub height: i32,
    pub downloaded_at: String,
    pub local_video_path: String,
    pub local_thumbnail_path: String,
    pub uploaded_to_object_store: i32,
    pub object_store_url: Option<String>,
    pub uploaded_to_cms: i32,
    pub cms_token: Option<String>,
}

/// New video for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::videos)]
pub struct NewVideo<'a> {
    pub post_id: &'a str,
    pub generation_id: &'a str,
    pub video_url: &'a str,
    pub thumbnail_url: &'a str,
    pub text: &'a str,
    pub username: &'a str,
    pub user_id: &'a str,
    pub posted_at: f64,
    pub width: i32,
    pub height: i32,
    pub downloaded_at: &'a str,
    pub local_video_path: &'a str,
    pub local_thumbnail_path: &'a str,
}
