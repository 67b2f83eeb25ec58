pub mod download;
pub mod feed;
pub mod image;
pub mod notify;
pub mod sqlx_repo;
