/// Default interval between receipt polls, in milliseconds.
pub const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 2_000;

/// Default number of receipt polls before giving up.
pub const DEFAULT_RECEIPT_MAX_ATTEMPTS: u32 = 5;

/// Default number of sponsorship responses held by a single pipeline run.
pub const DEFAULT_SPONSORSHIP_CACHE_CAPACITY: usize = 4;
