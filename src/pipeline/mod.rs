pub mod library;
pub mod persistence;

pub use library::ClipLibrary;
