use std::io::{self, Read, Write};

use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use pgz_core::{BlockEncoder, Codec};

/// LZ4 frame codec.
///
/// Fastest of the bundled codecs, at the cost of ratio. Best for NVMe/local
/// workloads where the parallel pass is bound by codec speed.
pub struct Lz4Codec;

struct Lz4Encoder<'a>(FrameEncoder<Box<dyn Write + 'a>>);

impl Write for Lz4Encoder<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl BlockEncoder for Lz4Encoder<'_> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let mut sink = self.0.finish().map_err(io::Error::other)?;
        sink.flush()
    }
}

impl Codec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn encoder<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn BlockEncoder + 'a>> {
        Ok(Box::new(Lz4Encoder(FrameEncoder::new(sink))))
    }

    fn decoder<'a>(&self, source: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(FrameDecoder::new(source)))
    }
}
