//! Process-global tunables. Read-only to the data path; settable at
//! startup or at runtime by the app thread.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaidSetOptions {
    pub process_window_size_kb: u32,
    pub process_max_bandwidth_mb_sec: u32,
}

impl Default for RaidSetOptions {
    fn default() -> Self {
        RaidSetOptions {
            process_window_size_kb: 1024,
            process_max_bandwidth_mb_sec: 0,
        }
    }
}
