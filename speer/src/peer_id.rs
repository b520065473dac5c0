use std::fmt;

use rand::Rng;

/// The 20-byte identity this process presents in handshakes and tracker
/// announces. Generated once at startup and passed around by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerId([u8; 20]);

const CLIENT_PREFIX: &[u8; 8] = b"-SP0100-";

impl PeerId {
    /// Azureus-style id: client prefix followed by 12 random digits.
    pub fn generate() -> Self {
        let mut id = [0u8; 20];
        id[..8].copy_from_slice(CLIENT_PREFIX);
        let mut rng = rand::thread_rng();
        for byte in id[8..].iter_mut() {
            *byte = rng.gen_range(b'0'..=b'9');
        }
        PeerId(id)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        PeerId(bytes)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_has_prefix_and_digits() {
        let id = PeerId::generate();
        assert_eq!(&id.as_bytes()[..8], CLIENT_PREFIX);
        assert!(id.as_bytes()[8..].iter().all(u8::is_ascii_digit));
    }

    #[test]
    fn test_two_ids_differ() {
        // 12 random digits; a collision here would be astronomical.
        assert_ne!(PeerId::generate(), PeerId::generate());
    }
}
