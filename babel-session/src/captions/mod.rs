mod caption_pipeline;
mod speech;

pub use caption_pipeline::*;
pub use speech::*;
