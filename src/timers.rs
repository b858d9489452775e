use std::time::Duration;

use crate::defaults::OWNER_PRIORITY;

/// Timers a Backup derives from the Master's advertisement interval.
/// Both values are in centiseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverTimers {
    pub skew_time: u16,
    pub master_down_interval: u16,
}

/// RFC 5798 section 6.1:
///   Skew_Time = Master_Adver_Interval - (Master_Adver_Interval * Priority / 256)
///   Master_Down_Interval = 3 * Master_Adver_Interval + Skew_Time
///
/// A higher priority gives a smaller skew, so better backups take over first.
/// The address owner (255) has no skew at all.
pub fn derive_failover_timers(priority: u8, master_adver_interval: u16) -> FailoverTimers {
    let interval = master_adver_interval as u32;
    let skew_time = match priority {
        OWNER_PRIORITY => 0,
        _ => interval - (interval * priority as u32) / 256,
    };
    let master_down_interval = 3 * interval + skew_time;
    FailoverTimers {
        skew_time: skew_time as u16,
        // a 12 bit interval keeps this well below u16::MAX
        master_down_interval: master_down_interval as u16,
    }
}

pub fn centis_to_duration(centis: u16) -> Duration {
    Duration::from_millis(centis as u64 * 10)
}

/// Rounds down to whole centiseconds.
pub fn duration_to_centis(duration: Duration) -> u128 {
    duration.as_millis() / 10
}
