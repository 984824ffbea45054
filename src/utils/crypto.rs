use crate::error::{LedgerError, Result};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use ring::digest::{Context, SHA256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch
pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LedgerError::internal(format!("System time error: {e}")))?
        .as_millis();

    i64::try_from(duration).map_err(|_| LedgerError::internal("Timestamp overflow"))
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(&sha256_digest(data))
}

pub fn hex_encode(data: &[u8]) -> String {
    HEXLOWER.encode(data)
}

/// Accepts upper and lower case digits
pub fn hex_decode(data: &str) -> Option<Vec<u8>> {
    HEXLOWER_PERMISSIVE.decode(data.trim().as_bytes()).ok()
}

/// Number of leading `'0'` characters in a hex digest
pub fn leading_zero_digits(hex: &str) -> usize {
    hex.bytes().take_while(|b| *b == b'0').count()
}
