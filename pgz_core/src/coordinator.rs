use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{IoResultExt, Result};
use crate::format::ContainerHeader;
use crate::plan::{CompressBlock, DecompressBlock};
use crate::signal::Awaiter;
use crate::worker::read_chunk;

/// Assemble the container at `destination` from finished compression blocks.
///
/// Each awaiter yields its block's descriptor together with the encoded
/// length the worker reported.
///
/// # Write sequence
/// ```text
/// [count][0 .. 0]                     ← header skeleton, zeroed size table
/// [block 0] [block 1] ... [block N-1] ← appended strictly in sequence order
/// ← seek back to offset 4, overwrite the size table with real sizes
/// ```
/// Blocks are awaited by sequence, never by completion order: a slow block
/// stalls the coordinator but cannot reorder the output. The destination is
/// written through a single open handle for the whole run.
pub fn write_container(
    destination: &Path,
    awaiters: Vec<Awaiter<(CompressBlock, u64)>>,
    chunk_size: usize,
) -> Result<ContainerHeader> {
    let mut header = ContainerHeader::placeholder(awaiters.len());
    let skeleton = header.to_bytes()?;

    let file = File::create(destination).at(destination)?;
    let mut out = BufWriter::with_capacity(chunk_size, file);
    out.write_all(&skeleton).at(destination)?;

    let mut buf = vec![0u8; chunk_size];
    for awaiter in awaiters {
        let (block, reported) = awaiter.wait()?;
        let copied = append(&block.encoded, &mut out, destination, &mut buf)?;
        check_len(&block.encoded, block.span.sequence, reported, copied)?;
        header.sizes[block.span.sequence as usize] = copied;
        debug!(sequence = block.span.sequence, bytes = copied, "block appended");
    }

    header.backpatch(&mut out).at(destination)?;
    out.flush().at(destination)?;
    Ok(header)
}

/// Concatenate decoded blocks into `destination` in sequence order.
///
/// Returns the total number of bytes written.
pub fn write_plain(
    destination: &Path,
    awaiters: Vec<Awaiter<(DecompressBlock, u64)>>,
    chunk_size: usize,
) -> Result<u64> {
    let file = File::create(destination).at(destination)?;
    let mut out = BufWriter::with_capacity(chunk_size, file);

    let mut buf = vec![0u8; chunk_size];
    let mut total = 0;
    for awaiter in awaiters {
        let (block, reported) = awaiter.wait()?;
        let copied = append(&block.decoded, &mut out, destination, &mut buf)?;
        check_len(&block.decoded, block.span.sequence, reported, copied)?;
        total += copied;
        debug!(sequence = block.span.sequence, bytes = copied, "block appended");
    }

    out.flush().at(destination)?;
    Ok(total)
}

/// Copy all of `src` onto `out` in `buf`-sized chunks.
fn append<W: Write>(src: &Path, out: &mut W, destination: &Path, buf: &mut [u8]) -> Result<u64> {
    let mut file = File::open(src).at(src)?;
    let mut copied = 0u64;
    loop {
        let n = read_chunk(&mut file, buf).at(src)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).at(destination)?;
        copied += n as u64;
    }
    Ok(copied)
}

fn check_len(src: &Path, sequence: u64, reported: u64, copied: u64) -> Result<()> {
    if reported == copied {
        return Ok(());
    }
    let err = io::Error::new(
        io::ErrorKind::InvalidData,
        format!("block {sequence}: worker reported {reported} bytes but {copied} were copied"),
    );
    Err::<(), _>(err).at(src)
}
