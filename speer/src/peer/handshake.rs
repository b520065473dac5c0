/// The 68-byte session opener: protocol string, 8 reserved bytes, the
/// torrent's info hash and the sender's peer id.
#[derive(Debug, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

pub const HANDSHAKE_LEN: usize = 68;

const PSTR: &[u8; 19] = b"BitTorrent protocol";

/// Posible handshake decoding errors.
#[derive(Debug, PartialEq, Eq)]
pub enum FromHandshakeError {
    WrongLength,
    WrongProtocol,
}

impl Handshake {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self { info_hash, peer_id }
    }

    /// Serializes to the fixed 68-byte wire form.
    pub fn as_bytes(&self) -> [u8; HANDSHAKE_LEN] {
        let mut bytes = [0u8; HANDSHAKE_LEN];
        bytes[0] = PSTR.len() as u8;
        bytes[1..20].copy_from_slice(PSTR);
        // bytes 20..28 stay zero (reserved)
        bytes[28..48].copy_from_slice(&self.info_hash);
        bytes[48..68].copy_from_slice(&self.peer_id);
        bytes
    }

    /// Parses the fixed 68-byte wire form.
    ///
    /// It returns a `FromHandshakeError` if:
    /// - The buffer is not exactly 68 bytes.
    /// - The protocol string is not "BitTorrent protocol".
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FromHandshakeError> {
        if bytes.len() != HANDSHAKE_LEN {
            return Err(FromHandshakeError::WrongLength);
        }
        if bytes[0] as usize != PSTR.len() || &bytes[1..20] != PSTR {
            return Err(FromHandshakeError::WrongProtocol);
        }

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&bytes[28..48]);
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&bytes[48..68]);

        Ok(Self { info_hash, peer_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_bytes_layout() {
        let info_hash = [1u8; 20];
        let peer_id = [2u8; 20];
        let bytes = Handshake::new(info_hash, peer_id).as_bytes();

        assert_eq!(bytes.len(), 68);
        assert_eq!(bytes[0], 19);
        assert_eq!(&bytes[1..20], b"BitTorrent protocol");
        assert_eq!(bytes[20..28], [0u8; 8]);
        assert_eq!(bytes[28..48], info_hash);
        assert_eq!(bytes[48..68], peer_id);
    }

    #[test]
    fn test_roundtrip() {
        let handshake = Handshake::new([0xAA; 20], [0xBB; 20]);
        let parsed = Handshake::from_bytes(&handshake.as_bytes()).unwrap();
        assert_eq!(parsed, handshake);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = Handshake::from_bytes(&[0u8; 67]).unwrap_err();
        assert_eq!(err, FromHandshakeError::WrongLength);
    }

    #[test]
    fn test_wrong_protocol_rejected() {
        let mut bytes = Handshake::new([0; 20], [0; 20]).as_bytes();
        bytes[1] = b'X';
        let err = Handshake::from_bytes(&bytes).unwrap_err();
        assert_eq!(err, FromHandshakeError::WrongProtocol);
    }
}
