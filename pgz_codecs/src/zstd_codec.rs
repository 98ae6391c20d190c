use std::io::{self, Read, Write};

use pgz_core::{BlockEncoder, Codec};

/// Zstandard block codec.
///
/// Each block is compressed as one independent frame at the configured level
/// (default: 3).
///
/// Best for: general text, JSON, logs, mixed structured data.
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

struct ZstdEncoder<'a>(zstd::stream::write::Encoder<'static, Box<dyn Write + 'a>>);

impl Write for ZstdEncoder<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl BlockEncoder for ZstdEncoder<'_> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let mut sink = self.0.finish()?;
        sink.flush()
    }
}

impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn encoder<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn BlockEncoder + 'a>> {
        let encoder = zstd::stream::write::Encoder::new(sink, self.level)?;
        Ok(Box::new(ZstdEncoder(encoder)))
    }

    fn decoder<'a>(&self, source: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(zstd::stream::read::Decoder::new(source)?))
    }
}
