use std::fmt;

/// Negotiated Bolt protocol version. Only 1 and 2 are modeled: the
/// handshake (§6) exchanges raw `u32`s, but this engine only ever proposes
/// and accepts these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BoltVersion {
    V1,
    V2,
}

impl BoltVersion {
    /// Decode the `u32` the server returns from the handshake. `0` means "no
    /// agreed version" and is not representable as a `BoltVersion` — callers
    /// must close the connection on that value themselves (§6).
    pub fn from_handshake(value: u32) -> Option<Self> {
        match value {
            1 => Some(BoltVersion::V1),
            2 => Some(BoltVersion::V2),
            _ => None,
        }
    }

    pub fn to_handshake(self) -> u32 {
        match self {
            BoltVersion::V1 => 1,
            BoltVersion::V2 => 2,
        }
    }

    /// The four candidate versions a client proposes during handshake,
    /// highest preference first, zero-padded to four entries per §6.
    pub fn candidates() -> [u32; 4] {
        [2, 1, 0, 0]
    }
}

impl fmt::Display for BoltVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoltVersion::V1 => write!(f, "1"),
            BoltVersion::V2 => write!(f, "2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_roundtrip() {
        for v in [BoltVersion::V1, BoltVersion::V2] {
            assert_eq!(BoltVersion::from_handshake(v.to_handshake()), Some(v));
        }
    }

    #[test]
    fn zero_is_no_agreement() {
        assert_eq!(BoltVersion::from_handshake(0), None);
    }
}
