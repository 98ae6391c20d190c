use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, PgzError, Result};
use crate::format::{ContainerHeader, HeaderError};

/// One contiguous byte range processed by a single worker.
///
/// For compression the range lies in the source file; for decompression it
/// lies in the container, past the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    /// 0-based, dense position of the block in the output.
    pub sequence: u64,
    pub start_offset: u64,
    pub len: u64,
}

impl BlockSpan {
    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.len
    }
}

/// Compression descriptor: a source range and the scratch file its encoded bytes go to.
#[derive(Debug, Clone)]
pub struct CompressBlock {
    pub span: BlockSpan,
    pub encoded: PathBuf,
}

/// Decompression descriptor: a container range plus its two scratch files.
#[derive(Debug, Clone)]
pub struct DecompressBlock {
    pub span: BlockSpan,
    /// Raw encoded bytes copied out of the container.
    pub extracted: PathBuf,
    /// Decoded output of `extracted`.
    pub decoded: PathBuf,
}

/// Partition `[0, source_len)` into `source_len / block_size` full blocks
/// followed by exactly one tail block of `source_len % block_size` bytes.
///
/// The tail is emitted even when it is empty, so an empty source yields one
/// zero-length block and a source that is an exact multiple of `block_size`
/// ends with a zero-length block.
pub fn plan_compression(source_len: u64, block_size: u64) -> Result<Vec<BlockSpan>> {
    if block_size == 0 {
        return Err(PgzError::Configuration("block size must be positive".into()));
    }
    let quotient = source_len / block_size;
    let remainder = source_len % block_size;

    // Reject before allocating: the count must fit the i32 header field.
    let count = quotient
        .checked_add(1)
        .filter(|&count| count <= i32::MAX as u64)
        .and_then(|count| usize::try_from(count).ok())
        .ok_or_else(|| {
            PgzError::Configuration(format!(
                "{source_len} bytes in {block_size}-byte blocks exceed the container's block count limit"
            ))
        })?;
    let mut spans = Vec::with_capacity(count);
    let mut start_offset = 0;
    for sequence in 0..quotient {
        spans.push(BlockSpan {
            sequence,
            start_offset,
            len: block_size,
        });
        start_offset += block_size;
    }
    spans.push(BlockSpan {
        sequence: quotient,
        start_offset,
        len: remainder,
    });
    Ok(spans)
}

/// Lay out the payload spans described by a parsed header.
pub fn spans_from_header(header: &ContainerHeader) -> Vec<BlockSpan> {
    let mut start_offset = header.encoded_len();
    header
        .sizes
        .iter()
        .enumerate()
        .map(|(i, &len)| {
            let span = BlockSpan {
                sequence: i as u64,
                start_offset,
                len,
            };
            start_offset += len;
            span
        })
        .collect()
}

/// Read the header of the container at `path` and plan one block per entry.
pub fn plan_decompression(path: &Path) -> Result<(ContainerHeader, Vec<BlockSpan>)> {
    let header = read_header(path)?;
    let spans = spans_from_header(&header);
    Ok((header, spans))
}

/// Open `path` and parse its container header against the file length.
pub fn read_header(path: &Path) -> Result<ContainerHeader> {
    let file = File::open(path).at(path)?;
    let file_len = file.metadata().at(path)?.len();
    let mut reader = BufReader::new(file);
    ContainerHeader::read_from(&mut reader, file_len).map_err(|err| match err {
        HeaderError::Malformed(msg) => PgzError::MalformedContainer(format!("{}: {msg}", path.display())),
        HeaderError::Io(source) => PgzError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}
