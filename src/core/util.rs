//! Common utilities

use std::fs::Metadata;
use std::time::SystemTime;
use xxhash_rust::xxh3::xxh3_64;

/// Compute an xxh3 hash of bytes as lowercase hex
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:016x}", xxh3_64(data))
}

/// Modification time in milliseconds since epoch from already fetched metadata
pub fn mtime_ms(metadata: &Metadata) -> std::io::Result<i64> {
    let mtime = metadata.modified()?;
    Ok(system_time_ms(mtime))
}

/// Convert a system time to milliseconds since epoch (pre-epoch clamps to 0)
pub fn system_time_ms(time: SystemTime) -> i64 {
    let duration = time.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    duration.as_millis() as i64
}

/// Get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    system_time_ms(SystemTime::now())
}
