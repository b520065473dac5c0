/// IDs of the messages defined in the protocol.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
}

/// A framed protocol message: one id byte plus payload. The 4-byte
/// big-endian length prefix is added/stripped at the framing boundary; a
/// zero length prefix is a keep-alive and never reaches `Message`.
#[derive(Debug, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub payload: Vec<u8>,
}

/// Posible message decoding errors.
#[derive(Debug, PartialEq, Eq)]
pub enum MessageError {
    EmptyFrame,
    UnknownId(u8),
    BadPayloadLength(MessageId),
}

impl Message {
    pub fn new(id: MessageId, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    pub fn have(index: u32) -> Self {
        Self::new(MessageId::Have, index.to_be_bytes().to_vec())
    }

    pub fn request(index: u32, begin: u32, length: u32) -> Self {
        let mut payload = Vec::with_capacity(12);
        payload.extend(index.to_be_bytes());
        payload.extend(begin.to_be_bytes());
        payload.extend(length.to_be_bytes());
        Self::new(MessageId::Request, payload)
    }

    pub fn piece(index: u32, begin: u32, block: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(8 + block.len());
        payload.extend(index.to_be_bytes());
        payload.extend(begin.to_be_bytes());
        payload.extend(block);
        Self::new(MessageId::Piece, payload)
    }

    /// Parses one frame (without the length prefix) into a message.
    pub fn from_bytes(frame: &[u8]) -> Result<Self, MessageError> {
        let (&id_byte, payload) = frame.split_first().ok_or(MessageError::EmptyFrame)?;
        let id = match id_byte {
            0 => MessageId::Choke,
            1 => MessageId::Unchoke,
            2 => MessageId::Interested,
            3 => MessageId::NotInterested,
            4 => MessageId::Have,
            5 => MessageId::Bitfield,
            6 => MessageId::Request,
            7 => MessageId::Piece,
            other => return Err(MessageError::UnknownId(other)),
        };
        Ok(Self {
            id,
            payload: payload.to_vec(),
        })
    }

    /// Serializes to wire form, length prefix included.
    pub fn as_bytes(&self) -> Vec<u8> {
        let frame_len = self.payload.len() + 1;
        let mut bytes = Vec::with_capacity(4 + frame_len);
        bytes.extend((frame_len as u32).to_be_bytes());
        bytes.push(self.id as u8);
        bytes.extend(&self.payload);
        bytes
    }

    /// The wire form of a keep-alive: a bare zero length prefix.
    pub fn keep_alive_bytes() -> [u8; 4] {
        0u32.to_be_bytes()
    }

    /// The piece index of a `have` payload.
    pub fn parse_have(&self) -> Result<u32, MessageError> {
        let bytes: [u8; 4] = self.payload[..]
            .try_into()
            .map_err(|_| MessageError::BadPayloadLength(MessageId::Have))?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// The `(index, begin, length)` triple of a `request` payload.
    pub fn parse_request(&self) -> Result<(u32, u32, u32), MessageError> {
        if self.payload.len() != 12 {
            return Err(MessageError::BadPayloadLength(MessageId::Request));
        }
        Ok((
            u32::from_be_bytes(self.payload[0..4].try_into().unwrap()),
            u32::from_be_bytes(self.payload[4..8].try_into().unwrap()),
            u32::from_be_bytes(self.payload[8..12].try_into().unwrap()),
        ))
    }

    /// The `(index, begin, block)` parts of a `piece` payload.
    pub fn parse_piece(&self) -> Result<(u32, u32, &[u8]), MessageError> {
        if self.payload.len() < 8 {
            return Err(MessageError::BadPayloadLength(MessageId::Piece));
        }
        Ok((
            u32::from_be_bytes(self.payload[0..4].try_into().unwrap()),
            u32::from_be_bytes(self.payload[4..8].try_into().unwrap()),
            &self.payload[8..],
        ))
    }
}
