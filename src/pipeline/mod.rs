pub mod aggregate;
pub mod chunker;
pub mod dispatch;
pub mod engine;
pub mod normalize;
pub mod speakers;

pub use aggregate::*;
pub use chunker::*;
pub use dispatch::*;
pub use engine::*;
pub use normalize::*;
pub use speakers::*;
