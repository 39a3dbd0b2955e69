/*++

Licensed under the Apache-2.0 license.

File Name:

    config.rs

Abstract:

    File contains the IPECC driver configuration.

--*/

use crate::WordLayout;

cfg_if::cfg_if! {
    if #[cfg(feature = "word64")] {
        const DEFAULT_WORD_LAYOUT: WordLayout = WordLayout::W64;
    } else {
        const DEFAULT_WORD_LAYOUT: WordLayout = WordLayout::W32;
    }
}

/// Driver options, fixed when binding to an IP instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpeccConfig {
    /// Must match the `W64` capability the IP was synthesized with.
    pub word_layout: WordLayout,

    /// Number of status reads after which a poll gives up with
    /// `DRIVER_IPECC_DEVICE_UNRESPONSIVE`. `None` polls forever.
    pub poll_limit: Option<u32>,
}

impl IpeccConfig {
    pub const fn new(word_layout: WordLayout) -> Self {
        Self {
            word_layout,
            poll_limit: None,
        }
    }

    pub const fn with_poll_limit(self, poll_limit: u32) -> Self {
        Self {
            poll_limit: Some(poll_limit),
            ..self
        }
    }
}

impl Default for IpeccConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WORD_LAYOUT)
    }
}
