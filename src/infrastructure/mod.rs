pub mod db;
pub mod library;
pub mod media;
