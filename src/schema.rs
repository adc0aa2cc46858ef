// Written to match the tables created by `crate::migrations`.

diesel::table! {
    videos (post_id) {
        post_id -> Text,
        generation_id -> Text,
        video_url -> Text,
        thumbnail_url -> Text,
        text -> Text,
        username -> Text,
        user_id -> Text,
        posted_at -> Double,
        width -> Integer,
        height -> Integer,
        downloaded_at -> Text,
        local_video_path -> Text,
        local_thumbnail_path -> Text,
        uploaded_to_object_store -> Integer,
        object_store_url -> Nullable<Text>,
        uploaded_to_cms -> Integer,
        cms_token -> Nullable<Text>,
    }
}
