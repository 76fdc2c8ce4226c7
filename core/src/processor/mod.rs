mod decoder;
mod job;
mod pool;

pub use decoder::{process_job, DecoderContext};
pub use job::DecoderJob;
pub use pool::DecoderPool;
