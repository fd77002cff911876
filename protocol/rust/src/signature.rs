//! 设备签名：`sha256("{deviceCode}:{window}:{key}")`，10 秒时间窗，容忍前一个时间窗。

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// 签名时间窗长度（毫秒）。
pub const SIGNATURE_WINDOW_MS: u64 = 10_000;
/// 永久授权记录签名使用的时间字段占位。
pub const PERMANENT_TOKEN: &str = "permanent";

/// 将毫秒时间戳对齐到所在时间窗起点。
pub fn compute_window(now_ms: u64) -> u64 {
    now_ms / SIGNATURE_WINDOW_MS * SIGNATURE_WINDOW_MS
}

/// 计算指定时间窗的设备签名（小写 hex）。
pub fn sign(device_code: &str, window_ms: u64, key: &str) -> String {
    sha256_hex(&format!("{device_code}:{window_ms}:{key}"))
}

/// 以当前时间窗签名。
pub fn sign_current(device_code: &str, key: &str) -> String {
    sign(device_code, compute_window(crate::now_ms()), key)
}

/// 设备授权记录签名：时间字段为过期时间（毫秒）或 `permanent`。
pub fn sign_record(device_code: &str, expires_at_ms: Option<u64>, key: &str) -> String {
    match expires_at_ms {
        Some(ms) => sign(device_code, ms, key),
        None => sha256_hex(&format!("{device_code}:{PERMANENT_TOKEN}:{key}")),
    }
}

/// 使用当前时间校验设备签名。
pub fn verify(device_code: &str, candidate: &str, key: &str) -> bool {
    verify_at(device_code, candidate, key, crate::now_ms())
}

/// 在给定时间点校验设备签名：先当前时间窗，再前一个时间窗。
///
/// 任何长度或编码不符的候选签名都直接判定失败。
pub fn verify_at(device_code: &str, candidate: &str, key: &str, now_ms: u64) -> bool {
    let current = compute_window(now_ms);
    let previous = current.checked_sub(SIGNATURE_WINDOW_MS);

    [Some(current), previous]
        .into_iter()
        .flatten()
        .any(|window| constant_time_eq(candidate, &sign(device_code, window, key)))
}

/// 定长比较：长度不同也会完整比较一遍后返回 false。
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let max_len = a.len().max(b.len());
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}

/// sha256 hex。
pub fn sha256_hex(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}
