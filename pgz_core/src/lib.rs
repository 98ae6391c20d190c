pub mod codec;
pub mod coordinator;
pub mod error;
pub mod format;
mod pipeline;
pub mod plan;
pub mod policy;
pub mod scratch;
pub mod session;
pub mod signal;
pub mod worker;

pub use codec::{BlockEncoder, Codec};
pub use error::{PgzError, Result};
pub use format::{ContainerHeader, DEFAULT_CHUNK_SIZE};
pub use plan::{read_header, BlockSpan};
pub use policy::{BlockSizePolicy, FanOutPolicy, FixedBlockSize};
pub use session::{Compressor, Decompressor, Session, SessionOptions};
