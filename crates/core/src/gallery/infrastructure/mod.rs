pub mod cached_gallery_source;
pub mod http_gallery_source;
pub mod json_snapshot_store;
