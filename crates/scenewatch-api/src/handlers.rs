//! Request handlers.

pub mod health;
pub mod image;
pub mod stream;
pub mod upload;
pub mod video;

pub use health::*;
pub use image::*;
pub use stream::*;
pub use video::*;
