use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pgz_core::{BlockEncoder, Codec};

/// Gzip (DEFLATE) block codec.
///
/// Every block is a complete gzip member of its own, so each one decodes
/// without the others. The container as a whole is not a gzip stream.
///
/// Best for: the default; widest tooling support for inspecting single blocks.
pub struct GzipCodec {
    /// Compression level (0 = store, 9 = slow / smallest).
    pub level: u32,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl GzipCodec {
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }
}

struct GzipEncoder<'a>(GzEncoder<Box<dyn Write + 'a>>);

impl Write for GzipEncoder<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl BlockEncoder for GzipEncoder<'_> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let mut sink = self.0.finish()?;
        sink.flush()
    }
}

impl Codec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn encoder<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn BlockEncoder + 'a>> {
        Ok(Box::new(GzipEncoder(GzEncoder::new(sink, Compression::new(self.level)))))
    }

    fn decoder<'a>(&self, source: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(GzDecoder::new(source)))
    }
}
