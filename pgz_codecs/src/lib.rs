mod gzip_codec;
mod lz4_codec;
mod passthrough;
mod zstd_codec;

pub use gzip_codec::GzipCodec;
pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zstd_codec::ZstdCodec;

use pgz_core::Codec;
use std::sync::Arc;

/// Names accepted by [`codec_by_name`], canonical name first.
pub const CODEC_NAMES: &[&str] = &["gzip", "zstd", "lz4", "passthrough"];

/// Resolve a codec from its CLI name.
///
/// The container does not record its codec, so decompression must be given
/// the same name that compression used. `level` applies to gzip and zstd and
/// falls back to each codec's default when `None`.
pub fn codec_by_name(name: &str, level: Option<i32>) -> anyhow::Result<Arc<dyn Codec>> {
    match name {
        "gzip" | "gz" => Ok(Arc::new(match level {
            Some(level) => GzipCodec::new(level.clamp(0, 9) as u32),
            None => GzipCodec::default(),
        })),
        "zstd" | "z" => Ok(Arc::new(match level {
            Some(level) => ZstdCodec::new(level),
            None => ZstdCodec::default(),
        })),
        "lz4" | "l" => Ok(Arc::new(Lz4Codec)),
        "passthrough" | "pass" | "none" => Ok(Arc::new(PassThroughCodec)),
        other => anyhow::bail!(
            "unknown codec '{}'. Valid options: {}",
            other,
            CODEC_NAMES.join(", ")
        ),
    }
}
