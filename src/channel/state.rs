//! Boot-mode and channel-mode state.
//!
//! The boot flag layers a one-shot collection window on top of the
//! runtime enable flag:
//!
//! ```text
//!            first fill consumed
//!   Armed ─────────────────────────▶ Off
//!     │
//!     │ ring filled once (write_index > capacity)
//!     ▼
//!   Completed   (terminal)
//! ```

use crate::error::TestingError;
use std::sync::atomic::{AtomicU8, Ordering};

/// One-shot boot collection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootMode {
    /// No boot collection; runtime collection may be enabled.
    #[default]
    Off,
    /// Collect from startup until the ring has been filled once,
    /// regardless of the runtime enable flag.
    Armed,
    /// Boot collection finished. All further writes are rejected.
    Completed,
}

impl BootMode {
    /// Numeric parameter value: 0 normal, 1 armed, 2 completed.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Armed => 1,
            Self::Completed => 2,
        }
    }
}

impl TryFrom<u8> for BootMode {
    type Error = TestingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Off),
            1 => Ok(Self::Armed),
            2 => Ok(Self::Completed),
            other => Err(TestingError::InvalidBootMode(other)),
        }
    }
}

impl std::fmt::Display for BootMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::Armed => "armed",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Lock-free readable cell holding a [`BootMode`].
///
/// Loads are allowed anywhere. Stores are only made while holding the
/// channel lock.
#[derive(Debug)]
pub(crate) struct BootCell(AtomicU8);

impl BootCell {
    pub(crate) fn new(mode: BootMode) -> Self {
        Self(AtomicU8::new(mode.as_u8()))
    }

    #[inline]
    pub(crate) fn load(&self) -> BootMode {
        match self.0.load(Ordering::Acquire) {
            0 => BootMode::Off,
            1 => BootMode::Armed,
            _ => BootMode::Completed,
        }
    }

    #[inline]
    pub(crate) fn store(&self, mode: BootMode) {
        self.0.store(mode.as_u8(), Ordering::Release);
    }
}

/// Combined view of the enable flag and boot mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Writes are rejected.
    Disabled,
    /// Writes accepted until explicitly disabled.
    RuntimeEnabled,
    /// Writes accepted until the ring has been filled once.
    BootArmed,
    /// Terminal; writes are rejected.
    BootCompleted,
}

impl ChannelMode {
    /// Derives the mode from the raw flags.
    pub fn from_flags(enabled: bool, boot: BootMode) -> Self {
        match (boot, enabled) {
            (BootMode::Completed, _) => Self::BootCompleted,
            (BootMode::Armed, _) => Self::BootArmed,
            (BootMode::Off, true) => Self::RuntimeEnabled,
            (BootMode::Off, false) => Self::Disabled,
        }
    }

    /// Returns true if the producer would accept a sample in this mode.
    pub fn accepts_writes(self) -> bool {
        matches!(self, Self::RuntimeEnabled | Self::BootArmed)
    }
}
