use snap::raw::{Decoder, Encoder};

use crate::error::{ArgonError, Result};

pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    Encoder::new()
        .compress_vec(data)
        .map_err(|e| ArgonError::Internal(format!("snappy compress: {e}")))
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    Decoder::new()
        .decompress_vec(data)
        .map_err(|_| ArgonError::CorruptCompressedPayload)
}
