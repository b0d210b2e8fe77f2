use std::io::Write;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Read;

use crate::error::{ArgonError, Result};

pub fn compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let level = Compression::new(level.clamp(0, 9) as u32);
    let mut encoder = GzEncoder::new(Vec::new(), level);
    encoder
        .write_all(data)
        .map_err(|e| ArgonError::Internal(format!("gzip compress: {e}")))?;
    encoder
        .finish()
        .map_err(|e| ArgonError::Internal(format!("gzip finish: {e}")))
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|_| ArgonError::CorruptCompressedPayload)?;
    Ok(out)
}
