use std::time::Duration;

pub const DEFAULT_BAUD: u32 = 9600;
pub const DEFAULT_NUMBER_OF_RETRIES: usize = 3;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);
/// Matches the module's default `NT` of 6 seconds.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(6);
const DEFAULT_UNSOLICITED_CAPACITY: usize = 32;

/// Tuning for a `Coordinator`.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Extra receive attempts allowed after the first one comes back empty.
    pub number_of_retries: usize,
    /// Upper bound on a single blocking read from the link.
    pub read_timeout: Duration,
    /// How long one receive attempt waits for a complete frame.
    pub receive_timeout: Duration,
    /// Silence that ends a node discovery scan.
    pub discovery_timeout: Duration,
    /// Unsolicited packets kept for `receive_any`. The oldest is dropped when full.
    pub unsolicited_capacity: usize,
    /// Ask each discovered device for its hardware and firmware versions.
    pub query_remote_versions: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            number_of_retries: DEFAULT_NUMBER_OF_RETRIES,
            read_timeout: DEFAULT_READ_TIMEOUT,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            unsolicited_capacity: DEFAULT_UNSOLICITED_CAPACITY,
            query_remote_versions: false,
        }
    }
}
