use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::codec::{BlockEncoder, Codec};
use crate::error::{IoResultExt, Result};
use crate::plan::{BlockSpan, CompressBlock, DecompressBlock};

/// Encode one source range into the block's scratch file.
///
/// The range is streamed through the codec `chunk_size` bytes at a time.
/// Returns the encoded byte count.
pub fn compress_block(source: &Path, block: &CompressBlock, codec: &dyn Codec, chunk_size: usize) -> Result<u64> {
    let span = block.span;
    let mut range = open_range(source, &span)?;

    let out = open_scratch(&block.encoded)?;
    let mut encoder = codec.encoder(Box::new(BufWriter::new(out))).at(&block.encoded)?;

    let mut buf = vec![0u8; chunk_size];
    let mut remaining = span.len;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = read_exact_chunk(&mut range, &mut buf[..want], &span).at(source)?;
        encoder.write_all(&buf[..n]).at(&block.encoded)?;
        remaining -= n as u64;
    }
    encoder.finish().at(&block.encoded)?;

    let encoded_len = fs::metadata(&block.encoded).at(&block.encoded)?.len();
    debug!(
        sequence = span.sequence,
        original = span.len,
        encoded = encoded_len,
        "block compressed"
    );
    Ok(encoded_len)
}

/// Extract one encoded block from the container and decode it.
///
/// Two steps, each against a private scratch file: the block's raw bytes
/// are copied out of the container into `extracted`, then decoded into
/// `decoded`. Returns the decoded byte count.
pub fn decompress_block(
    container: &Path,
    block: &DecompressBlock,
    codec: &dyn Codec,
    chunk_size: usize,
) -> Result<u64> {
    let mut buf = vec![0u8; chunk_size];
    extract(container, block, &mut buf)?;

    let src = File::open(&block.extracted).at(&block.extracted)?;
    let mut decoder = codec.decoder(Box::new(BufReader::new(src))).at(&block.extracted)?;
    let mut out = BufWriter::new(open_scratch(&block.decoded)?);

    let mut decoded_len = 0u64;
    loop {
        let n = read_chunk(&mut decoder, &mut buf).at(&block.extracted)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).at(&block.decoded)?;
        decoded_len += n as u64;
    }
    out.flush().at(&block.decoded)?;

    debug!(
        sequence = block.span.sequence,
        encoded = block.span.len,
        decoded = decoded_len,
        "block decompressed"
    );
    Ok(decoded_len)
}

fn extract(container: &Path, block: &DecompressBlock, buf: &mut [u8]) -> Result<()> {
    let span = block.span;
    let mut range = open_range(container, &span)?;
    let mut out = BufWriter::new(open_scratch(&block.extracted)?);

    let mut remaining = span.len;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = read_exact_chunk(&mut range, &mut buf[..want], &span).at(container)?;
        out.write_all(&buf[..n]).at(&block.extracted)?;
        remaining -= n as u64;
    }
    out.flush().at(&block.extracted)
}

/// Open `path` for shared reading, limited to the bytes of `span`.
fn open_range(path: &Path, span: &BlockSpan) -> Result<io::Take<File>> {
    let mut file = File::open(path).at(path)?;
    file.seek(SeekFrom::Start(span.start_offset)).at(path)?;
    Ok(file.take(span.len))
}

fn open_scratch(path: &Path) -> Result<File> {
    OpenOptions::new().write(true).truncate(true).open(path).at(path)
}

/// Fill `buf` completely, or fail if the range ends first.
///
/// A short read never ends a block early: the loop keeps reading until the
/// chunk is full, and only a genuine end of file counts as the end of data.
fn read_exact_chunk<R: Read>(src: &mut R, buf: &mut [u8], span: &BlockSpan) -> io::Result<usize> {
    let n = read_chunk(src, buf)?;
    if n < buf.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "block {} ended early: range [{}, {}) is no longer fully readable",
                span.sequence,
                span.start_offset,
                span.end_offset()
            ),
        ));
    }
    Ok(n)
}

/// Read until `buf` is full or the source reports end of data.
pub(crate) fn read_chunk<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
