use chrono::{TimeZone, Utc};
use uuid::Uuid;

/// 当前 Unix 时间戳（秒）
pub fn current_timestamp() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// 时间戳格式化为可读字符串，用于 stat 输出
pub fn format_timestamp(ts: u64) -> String {
    match Utc.timestamp_opt(ts as i64, 0).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => ts.to_string(),
    }
}

/// 生成一个随机唯一 ID
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}
