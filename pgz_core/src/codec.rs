use std::io::{self, Read, Write};

/// A streaming encoder over one block.
///
/// Bytes written are encoded into the sink handed to [`Codec::encoder`];
/// `finish` flushes any trailer (gzip footer, zstd epilogue, lz4 end mark).
/// Dropping an encoder without calling `finish` leaves a truncated block.
pub trait BlockEncoder: Write {
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Core compression abstraction.
///
/// Each `Codec` implementation:
/// - Encodes and decodes a single block as an independent stream. No state
///   is shared across blocks, which is what lets every block of a container
///   be processed on its own thread.
/// - Works on streams rather than buffers, so a block is never materialized
///   in memory as a whole.
///
/// The container does not record which codec produced it; the same codec
/// must be supplied to compress and decompress.
pub trait Codec: Send + Sync {
    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    /// Wrap `sink` in an encoder for one block.
    fn encoder<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn BlockEncoder + 'a>>;

    /// Wrap `source`, a complete encoded block, in a decoding reader.
    fn decoder<'a>(&self, source: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>>;
}
