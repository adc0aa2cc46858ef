//! Domain models.

mod feed;
mod item;
mod media;

pub use feed::{
    Attachment, Encoding, FeedItem, FeedResponse, Post, Profile, DOWNLOADABLE_KIND,
};
pub use item::Item;
pub use media::MediaType;
