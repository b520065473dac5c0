use std::collections::BTreeMap;

/// A bencoded value.
///
/// Dictionaries are kept in a `BTreeMap` so encoding is always canonical
/// (keys sorted byte-wise), which matters when hashing an `info` dict.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Bencode {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<Bencode>),
    Dict(BTreeMap<Vec<u8>, Bencode>),
}

/// Posible bencode decoding errors.
#[derive(PartialEq, Eq, Debug)]
pub enum BencodeError {
    UnexpectedEnd,
    UnknownPrefix(u8),
    InvalidInt,
    InvalidLength,
    NonStringDictKey,
    TrailingData,
}

pub trait ToBencode {
    fn to_bencode(&self) -> Bencode;
}

impl ToBencode for String {
    fn to_bencode(&self) -> Bencode {
        Bencode::Bytes(self.as_bytes().to_vec())
    }
}

impl ToBencode for &str {
    fn to_bencode(&self) -> Bencode {
        Bencode::Bytes(self.as_bytes().to_vec())
    }
}

impl ToBencode for Vec<u8> {
    fn to_bencode(&self) -> Bencode {
        Bencode::Bytes(self.clone())
    }
}

impl ToBencode for i64 {
    fn to_bencode(&self) -> Bencode {
        Bencode::Int(*self)
    }
}

impl ToBencode for u64 {
    fn to_bencode(&self) -> Bencode {
        Bencode::Int(*self as i64)
    }
}

impl ToBencode for u32 {
    fn to_bencode(&self) -> Bencode {
        Bencode::Int((*self).into())
    }
}

impl ToBencode for u16 {
    fn to_bencode(&self) -> Bencode {
        Bencode::Int((*self).into())
    }
}

impl<T: ToBencode> ToBencode for Vec<T> {
    fn to_bencode(&self) -> Bencode {
        Bencode::List(self.iter().map(|v| v.to_bencode()).collect())
    }
}

impl Bencode {
    /// Decodes a full bencoded byte string.
    ///
    /// The whole input must be consumed; leftover bytes are an error, since
    /// a metafile is a single top-level value.
    pub fn decode(data: &[u8]) -> Result<Bencode, BencodeError> {
        let mut decoder = Decoder { data, pos: 0 };
        let value = decoder.decode_value()?;
        if decoder.pos != data.len() {
            return Err(BencodeError::TrailingData);
        }
        Ok(value)
    }

    /// Encodes the value into its canonical bencoded form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Bencode::Int(n) => {
                out.push(b'i');
                out.extend(n.to_string().as_bytes());
                out.push(b'e');
            }
            Bencode::Bytes(bytes) => {
                out.extend(bytes.len().to_string().as_bytes());
                out.push(b':');
                out.extend(bytes);
            }
            Bencode::List(items) => {
                out.push(b'l');
                for item in items {
                    item.encode_into(out);
                }
                out.push(b'e');
            }
            Bencode::Dict(entries) => {
                out.push(b'd');
                for (key, value) in entries {
                    out.extend(key.len().to_string().as_bytes());
                    out.push(b':');
                    out.extend(key);
                    value.encode_into(out);
                }
                out.push(b'e');
            }
        }
    }
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEnd)
    }

    fn bump(&mut self) -> Result<u8, BencodeError> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    fn decode_value(&mut self) -> Result<Bencode, BencodeError> {
        match self.peek()? {
            b'i' => self.decode_int(),
            b'l' => self.decode_list(),
            b'd' => self.decode_dict(),
            b'0'..=b'9' => self.decode_bytes(),
            other => Err(BencodeError::UnknownPrefix(other)),
        }
    }

    fn decode_int(&mut self) -> Result<Bencode, BencodeError> {
        self.bump()?; // 'i'
        let start = self.pos;
        while self.peek()? != b'e' {
            self.pos += 1;
        }
        let digits = std::str::from_utf8(&self.data[start..self.pos])
            .map_err(|_| BencodeError::InvalidInt)?;
        let n = digits.parse::<i64>().map_err(|_| BencodeError::InvalidInt)?;
        self.bump()?; // 'e'
        Ok(Bencode::Int(n))
    }

    fn decode_bytes(&mut self) -> Result<Bencode, BencodeError> {
        let start = self.pos;
        while self.peek()? != b':' {
            self.pos += 1;
        }
        let digits = std::str::from_utf8(&self.data[start..self.pos])
            .map_err(|_| BencodeError::InvalidLength)?;
        let length = digits
            .parse::<usize>()
            .map_err(|_| BencodeError::InvalidLength)?;
        self.bump()?; // ':'
        if self.pos + length > self.data.len() {
            return Err(BencodeError::UnexpectedEnd);
        }
        let bytes = self.data[self.pos..self.pos + length].to_vec();
        self.pos += length;
        Ok(Bencode::Bytes(bytes))
    }

    fn decode_list(&mut self) -> Result<Bencode, BencodeError> {
        self.bump()?; // 'l'
        let mut items = Vec::new();
        while self.peek()? != b'e' {
            items.push(self.decode_value()?);
        }
        self.bump()?; // 'e'
        Ok(Bencode::List(items))
    }

    fn decode_dict(&mut self) -> Result<Bencode, BencodeError> {
        self.bump()?; // 'd'
        let mut entries = BTreeMap::new();
        while self.peek()? != b'e' {
            let key = match self.decode_value()? {
                Bencode::Bytes(key) => key,
                _ => return Err(BencodeError::NonStringDictKey),
            };
            let value = self.decode_value()?;
            entries.insert(key, value);
        }
        self.bump()?; // 'e'
        Ok(Bencode::Dict(entries))
    }
}
