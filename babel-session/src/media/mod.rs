mod local_media;
mod media_renderer;
mod remote_stream;

pub use local_media::*;
pub use media_renderer::*;
pub use remote_stream::*;
