// Named `zstd_codec` rather than `zstd` so it doesn't shadow the `zstd` crate
// inside this module's own scope.

use crate::error::{ArgonError, Result};

pub fn compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    zstd::encode_all(data, level).map_err(|e| ArgonError::Internal(format!("zstd compress: {e}")))
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data).map_err(|_| ArgonError::CorruptCompressedPayload)
}
