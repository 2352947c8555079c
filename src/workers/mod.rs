pub mod cleanup;
pub mod scanner;
pub mod thumbnailer;
pub mod transcoder;
pub mod watcher;
