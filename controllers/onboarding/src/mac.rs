//! Port MAC address generation.
//!
//! Addresses use the Xen OUI `00:16:3e` with the fourth octet capped at
//! `0x7f`. The random source is injected so tests can pin the output.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Organizationally unique identifier prefixed to every generated MAC
pub const MAC_OUI: [u8; 3] = [0x00, 0x16, 0x3e];

pub struct MacGenerator {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl MacGenerator {
    pub fn new(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// Generator seeded from the OS entropy source
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Next MAC address, formatted as lowercase colon-separated hex
    pub fn next_mac(&self) -> String {
        let mut guard = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let rng = &mut *guard;
        let octets = [
            MAC_OUI[0],
            MAC_OUI[1],
            MAC_OUI[2],
            rng.r#gen::<u8>() & 0x7f,
            rng.r#gen::<u8>(),
            rng.r#gen::<u8>(),
        ];
        octets
            .iter()
            .map(|o| format!("{o:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Debug for MacGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacGenerator").finish_non_exhaustive()
    }
}
