pub mod ffmpeg;

pub use ffmpeg::{HwAccel, MediaTools};
