use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{PgzError, Result};

/// Size of the leading block count field in bytes (i32 LE).
pub const COUNT_SIZE: u64 = 4;

/// Size of each size-table entry in bytes (i64 LE).
pub const SIZE_ENTRY_SIZE: u64 = 8;

/// Copy buffer used by workers and the coordinator: 80 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 80 * 1024;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the container header.
///
/// # Layout
/// ```text
/// [block_count: i32 LE]
/// [size[0]: i64 LE] ... [size[n-1]: i64 LE]
/// [payload[0]] ... [payload[n-1]]           ← contiguous, no padding
/// ```
/// `payload[i]` is exactly `size[i]` bytes, so the start of every block is
/// the header length plus the sizes of all blocks before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub sizes: Vec<u64>,
}

impl ContainerHeader {
    /// Header with `block_count` zeroed size placeholders.
    pub fn placeholder(block_count: usize) -> Self {
        Self {
            sizes: vec![0; block_count],
        }
    }

    pub fn block_count(&self) -> usize {
        self.sizes.len()
    }

    /// Length of the serialized header in bytes.
    pub fn encoded_len(&self) -> u64 {
        header_len(self.sizes.len() as u64)
    }

    /// Total payload bytes described by the size table.
    pub fn payload_len(&self) -> u64 {
        self.sizes.iter().sum()
    }

    /// Expected length of the whole container file.
    pub fn container_len(&self) -> u64 {
        self.encoded_len() + self.payload_len()
    }

    /// Serialize to exactly `encoded_len()` bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let count = i32::try_from(self.sizes.len()).map_err(|_| {
            PgzError::Configuration(format!(
                "{} blocks do not fit the 32-bit block count",
                self.sizes.len()
            ))
        })?;
        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        buf.extend_from_slice(&count.to_le_bytes());
        buf.extend_from_slice(&self.size_table_bytes()?);
        Ok(buf)
    }

    /// Serialize only the size table, for backpatching at offset `COUNT_SIZE`.
    pub fn size_table_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.sizes.len() * SIZE_ENTRY_SIZE as usize);
        for (i, &size) in self.sizes.iter().enumerate() {
            let size = i64::try_from(size).map_err(|_| {
                PgzError::Configuration(format!("block {i} size {size} overflows the size table"))
            })?;
            buf.extend_from_slice(&size.to_le_bytes());
        }
        Ok(buf)
    }

    /// Overwrite the size table of an already written header in place.
    ///
    /// The stream position is left just past the size table.
    pub fn backpatch<W: Write + Seek>(&self, out: &mut W) -> std::io::Result<()> {
        let table = self
            .size_table_bytes()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
        out.seek(SeekFrom::Start(COUNT_SIZE))?;
        out.write_all(&table)
    }

    /// Read and validate a header from the start of a container of `file_len` bytes.
    ///
    /// Any inconsistency between the declared table and the file length is
    /// reported as [`PgzError::MalformedContainer`]; plain read failures are
    /// returned as `io::Error` for the caller to attach a path to.
    pub fn read_from<R: Read>(src: &mut R, file_len: u64) -> std::result::Result<Self, HeaderError> {
        if file_len < COUNT_SIZE {
            return Err(HeaderError::malformed(format!(
                "file is {file_len} bytes, shorter than the {COUNT_SIZE}-byte block count"
            )));
        }
        let mut count_buf = [0u8; COUNT_SIZE as usize];
        src.read_exact(&mut count_buf)?;
        let count = i32::from_le_bytes(count_buf);
        if count < 0 {
            return Err(HeaderError::malformed(format!("negative block count {count}")));
        }

        let header_len = header_len(count as u64);
        if file_len < header_len {
            return Err(HeaderError::malformed(format!(
                "header declares {count} blocks ({header_len} bytes) but file is only {file_len} bytes"
            )));
        }

        let mut sizes = Vec::with_capacity(count as usize);
        let mut entry = [0u8; SIZE_ENTRY_SIZE as usize];
        let mut total = header_len;
        for i in 0..count {
            src.read_exact(&mut entry)?;
            let size = i64::from_le_bytes(entry);
            let size = u64::try_from(size)
                .map_err(|_| HeaderError::malformed(format!("block {i} has negative size {size}")))?;
            total = total
                .checked_add(size)
                .ok_or_else(|| HeaderError::malformed("size table overflows a 64-bit length"))?;
            sizes.push(size);
        }

        if total != file_len {
            return Err(HeaderError::malformed(format!(
                "header describes {total} bytes but file is {file_len} bytes"
            )));
        }
        Ok(Self { sizes })
    }
}

/// Byte length of a header describing `block_count` blocks.
pub fn header_len(block_count: u64) -> u64 {
    COUNT_SIZE + SIZE_ENTRY_SIZE * block_count
}

/// Failure while decoding a header, before a path is known.
#[derive(Debug)]
pub enum HeaderError {
    Malformed(String),
    Io(std::io::Error),
}

impl HeaderError {
    fn malformed(msg: impl Into<String>) -> Self {
        HeaderError::Malformed(msg.into())
    }
}

impl From<std::io::Error> for HeaderError {
    fn from(err: std::io::Error) -> Self {
        HeaderError::Io(err)
    }
}
