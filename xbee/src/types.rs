use std::fmt::{self, Debug};

/// Correlation token echoed by the module in its reply. Zero means "no reply wanted".
pub type FrameId = u8;
pub type ShortAddress = u16;
pub type ExtendedAddress = u64;

/// Network address reported for devices that have not joined, or that are addressed by serial
/// number only.
pub const UNKNOWN_NETWORK_ADDRESS: ShortAddress = 0xFFFE;

#[derive(Copy, Clone, PartialEq)]
pub struct SourceAddress {
    pub short: ShortAddress,
    pub extended: Option<ExtendedAddress>,
}

impl Debug for SourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.extended {
            Some(extended) => write!(f, "SourceAddress({:#06x}, {:#018x})", self.short, extended),
            None => write!(f, "SourceAddress({:#06x})", self.short),
        }
    }
}
