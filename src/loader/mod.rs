pub mod clip_loader;

pub use clip_loader::ClipLoader;
