use std::io::{self, Read, Write};

use pgz_core::{BlockEncoder, Codec};

/// No-op codec: stores blocks verbatim, with no compression.
///
/// Useful for:
/// - Verifying the container round-trip independently of any codec.
/// - Data that is already compressed (e.g., JPEG, MP4) where further
///   compression would expand the file.
pub struct PassThroughCodec;

struct Verbatim<'a>(Box<dyn Write + 'a>);

impl Write for Verbatim<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl BlockEncoder for Verbatim<'_> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.0.flush()
    }
}

impl Codec for PassThroughCodec {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn encoder<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn BlockEncoder + 'a>> {
        Ok(Box::new(Verbatim(sink)))
    }

    fn decoder<'a>(&self, source: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(source)
    }
}
