pub mod chunk;
pub mod cost;
pub mod diarizer;
pub mod entity;
pub mod extraction;
pub mod report;
pub mod speaker;
pub mod transcript;

pub use chunk::*;
pub use cost::*;
pub use diarizer::*;
pub use entity::*;
pub use extraction::*;
pub use report::*;
pub use speaker::*;
pub use transcript::*;
