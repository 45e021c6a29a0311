//! Handshake wire records and their binary codec.
//!
//! Wire format (big-endian): one tag byte followed by the message fields.
//! Variable-length byte strings and strings carry a `u16` length prefix.
//! Integers (`N`, `g`, `s`, `A`, `B`) travel as minimal big-endian byte
//! strings. IV fields must be exactly 12 bytes, or absent (length 0) where
//! the field is optional.
//!
//! The handshake sequence is fixed:
//! ClientHello → ServerHello → (SrpIdentify → SrpServerKeyExchange →
//! SrpClientKeyExchange)? → SessionChallenge → SessionResponse, the SRP
//! triple skipped for anonymous peers.

use crate::crypto::random::IV_SIZE;
use crate::error::{BeamPeerError, Result};

/// Identification method requested in the client hello (wire values).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identify {
    Srp = 1,
    Anonymous = 2,
}

impl Identify {
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            1 => Some(Identify::Srp),
            2 => Some(Identify::Anonymous),
            _ => None,
        }
    }
}

/// Message tag bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Tag {
    ClientHello = 0x01,
    ServerHello = 0x02,
    SrpIdentify = 0x03,
    SrpServerKeyExchange = 0x04,
    SrpClientKeyExchange = 0x05,
    SessionChallenge = 0x06,
    SessionResponse = 0x07,
}

impl TryFrom<u8> for Tag {
    type Error = BeamPeerError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Tag::ClientHello),
            0x02 => Ok(Tag::ServerHello),
            0x03 => Ok(Tag::SrpIdentify),
            0x04 => Ok(Tag::SrpServerKeyExchange),
            0x05 => Ok(Tag::SrpClientKeyExchange),
            0x06 => Ok(Tag::SessionChallenge),
            0x07 => Ok(Tag::SessionResponse),
            other => Err(BeamPeerError::UnknownMessageTag(other)),
        }
    }
}

/// Semantic version triple carried by both challenge and response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// The version of this crate, as announced to peers.
    pub fn current() -> Self {
        Self {
            major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// First message: the client's cipher offer, identify method, and optional
/// ECDH envelope (public key + IV, both present or both absent).
#[derive(Debug, Clone, Default)]
pub struct ClientHello {
    pub encryption: u32,
    pub identify: u32,
    pub public_key: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Server's cipher choice; IV present iff the ECDH envelope was accepted.
#[derive(Debug, Clone, Default)]
pub struct ServerHello {
    pub encryption: u32,
    pub iv: Vec<u8>,
}

/// The SRP username, UTF-8.
#[derive(Debug, Clone, Default)]
pub struct SrpIdentify {
    pub username: String,
}

/// Server's SRP parameters: group, salt, public ephemeral, fresh IV.
#[derive(Debug, Clone, Default)]
pub struct SrpServerKeyExchange {
    pub number: Vec<u8>,
    pub generator: Vec<u8>,
    pub salt: Vec<u8>,
    pub b: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Client's SRP public ephemeral and IV.
#[derive(Debug, Clone, Default)]
pub struct SrpClientKeyExchange {
    pub a: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Peer description attached to challenge and response.
#[derive(Debug, Clone, Default)]
pub struct PeerFacts {
    pub version: Version,
    pub os_type: u32,
    pub computer_name: String,
    pub cpu_cores: u32,
}

/// Server announces the session types it will accept.
#[derive(Debug, Clone, Default)]
pub struct SessionChallenge {
    pub session_types: u32,
    pub facts: PeerFacts,
}

/// Client picks exactly one session type.
#[derive(Debug, Clone, Default)]
pub struct SessionResponse {
    pub session_type: u32,
    pub facts: PeerFacts,
}

/// Any handshake message, for framing through one codec.
#[derive(Debug, Clone)]
pub enum Message {
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    SrpIdentify(SrpIdentify),
    SrpServerKeyExchange(SrpServerKeyExchange),
    SrpClientKeyExchange(SrpClientKeyExchange),
    SessionChallenge(SessionChallenge),
    SessionResponse(SessionResponse),
}

// ── Encoding ─────────────────────────────────────────────────────────────

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    debug_assert!(bytes.len() <= u16::MAX as usize);
    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn put_facts(buf: &mut Vec<u8>, facts: &PeerFacts) {
    put_u32(buf, facts.version.major);
    put_u32(buf, facts.version.minor);
    put_u32(buf, facts.version.patch);
    put_u32(buf, facts.os_type);
    put_bytes(buf, facts.computer_name.as_bytes());
    put_u32(buf, facts.cpu_cores);
}

impl Message {
    fn tag(&self) -> Tag {
        match self {
            Message::ClientHello(_) => Tag::ClientHello,
            Message::ServerHello(_) => Tag::ServerHello,
            Message::SrpIdentify(_) => Tag::SrpIdentify,
            Message::SrpServerKeyExchange(_) => Tag::SrpServerKeyExchange,
            Message::SrpClientKeyExchange(_) => Tag::SrpClientKeyExchange,
            Message::SessionChallenge(_) => Tag::SessionChallenge,
            Message::SessionResponse(_) => Tag::SessionResponse,
        }
    }

    /// Serialize into the tagged binary form.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.push(self.tag() as u8);
        match self {
            Message::ClientHello(m) => {
                put_u32(&mut buf, m.encryption);
                put_u32(&mut buf, m.identify);
                put_bytes(&mut buf, &m.public_key);
                put_bytes(&mut buf, &m.iv);
            }
            Message::ServerHello(m) => {
                put_u32(&mut buf, m.encryption);
                put_bytes(&mut buf, &m.iv);
            }
            Message::SrpIdentify(m) => {
                put_bytes(&mut buf, m.username.as_bytes());
            }
            Message::SrpServerKeyExchange(m) => {
                put_bytes(&mut buf, &m.number);
                put_bytes(&mut buf, &m.generator);
                put_bytes(&mut buf, &m.salt);
                put_bytes(&mut buf, &m.b);
                put_bytes(&mut buf, &m.iv);
            }
            Message::SrpClientKeyExchange(m) => {
                put_bytes(&mut buf, &m.a);
                put_bytes(&mut buf, &m.iv);
            }
            Message::SessionChallenge(m) => {
                put_u32(&mut buf, m.session_types);
                put_facts(&mut buf, &m.facts);
            }
            Message::SessionResponse(m) => {
                put_u32(&mut buf, m.session_type);
                put_facts(&mut buf, &m.facts);
            }
        }
        buf
    }

    /// Parse one message from its tagged binary form. The whole buffer must
    /// be consumed; trailing bytes are an error.
    pub fn decode(data: &[u8]) -> Result<Message> {
        let mut r = Reader::new(data);
        let tag = Tag::try_from(r.u8()?)?;
        let message = match tag {
            Tag::ClientHello => Message::ClientHello(ClientHello {
                encryption: r.u32()?,
                identify: r.u32()?,
                public_key: r.bytes()?,
                iv: r.iv()?,
            }),
            Tag::ServerHello => Message::ServerHello(ServerHello {
                encryption: r.u32()?,
                iv: r.iv()?,
            }),
            Tag::SrpIdentify => Message::SrpIdentify(SrpIdentify {
                username: r.string()?,
            }),
            Tag::SrpServerKeyExchange => Message::SrpServerKeyExchange(SrpServerKeyExchange {
                number: r.bytes()?,
                generator: r.bytes()?,
                salt: r.bytes()?,
                b: r.bytes()?,
                iv: r.iv()?,
            }),
            Tag::SrpClientKeyExchange => Message::SrpClientKeyExchange(SrpClientKeyExchange {
                a: r.bytes()?,
                iv: r.iv()?,
            }),
            Tag::SessionChallenge => Message::SessionChallenge(SessionChallenge {
                session_types: r.u32()?,
                facts: r.facts()?,
            }),
            Tag::SessionResponse => Message::SessionResponse(SessionResponse {
                session_type: r.u32()?,
                facts: r.facts()?,
            }),
        };
        r.expect_end()?;
        Ok(message)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Message::ClientHello(_) => "ClientHello",
            Message::ServerHello(_) => "ServerHello",
            Message::SrpIdentify(_) => "SrpIdentify",
            Message::SrpServerKeyExchange(_) => "SrpServerKeyExchange",
            Message::SrpClientKeyExchange(_) => "SrpClientKeyExchange",
            Message::SessionChallenge(_) => "SessionChallenge",
            Message::SessionResponse(_) => "SessionResponse",
        }
    }
}

// ── Decoding ─────────────────────────────────────────────────────────────

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(BeamPeerError::Truncated {
                need: self.pos + n - self.data.len(),
                at: self.pos,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u16()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// A length-prefixed IV: exactly 12 bytes, or empty where optional.
    fn iv(&mut self) -> Result<Vec<u8>> {
        let iv = self.bytes()?;
        if !iv.is_empty() && iv.len() != IV_SIZE {
            return Err(BeamPeerError::InvalidField {
                field: "iv",
                reason: format!("expected {IV_SIZE} bytes, got {}", iv.len()),
            });
        }
        Ok(iv)
    }

    fn string(&mut self) -> Result<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|e| BeamPeerError::InvalidField {
            field: "string",
            reason: e.to_string(),
        })
    }

    fn facts(&mut self) -> Result<PeerFacts> {
        Ok(PeerFacts {
            version: Version {
                major: self.u32()?,
                minor: self.u32()?,
                patch: self.u32()?,
            },
            os_type: self.u32()?,
            computer_name: self.string()?,
            cpu_cores: self.u32()?,
        })
    }

    fn expect_end(&self) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(BeamPeerError::InvalidField {
                field: "message",
                reason: format!("{} trailing byte(s)", self.data.len() - self.pos),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(message: Message) -> Message {
        Message::decode(&message.encode()).unwrap()
    }

    #[test]
    fn client_hello_roundtrip() {
        let out = roundtrip(Message::ClientHello(ClientHello {
            encryption: 0x03,
            identify: 1,
            public_key: vec![0xAB; 32],
            iv: vec![0x01; 12],
        }));
        let Message::ClientHello(m) = out else {
            panic!("wrong variant");
        };
        assert_eq!(m.encryption, 0x03);
        assert_eq!(m.identify, 1);
        assert_eq!(m.public_key, vec![0xAB; 32]);
        assert_eq!(m.iv, vec![0x01; 12]);
    }

    #[test]
    fn empty_optional_fields_roundtrip() {
        let out = roundtrip(Message::ClientHello(ClientHello {
            encryption: 0x02,
            identify: 2,
            public_key: Vec::new(),
            iv: Vec::new(),
        }));
        let Message::ClientHello(m) = out else {
            panic!("wrong variant");
        };
        assert!(m.public_key.is_empty());
        assert!(m.iv.is_empty());
    }

    #[test]
    fn key_exchange_roundtrip() {
        let out = roundtrip(Message::SrpServerKeyExchange(SrpServerKeyExchange {
            number: vec![0xFF; 384],
            generator: vec![5],
            salt: vec![0x11; 64],
            b: vec![0x22; 384],
            iv: vec![0x33; 12],
        }));
        let Message::SrpServerKeyExchange(m) = out else {
            panic!("wrong variant");
        };
        assert_eq!(m.number.len(), 384);
        assert_eq!(m.generator, vec![5]);
    }

    #[test]
    fn challenge_roundtrip_preserves_facts() {
        let out = roundtrip(Message::SessionChallenge(SessionChallenge {
            session_types: 0b0101,
            facts: PeerFacts {
                version: Version {
                    major: 2,
                    minor: 7,
                    patch: 1,
                },
                os_type: 2,
                computer_name: "workstation-04".into(),
                cpu_cores: 16,
            },
        }));
        let Message::SessionChallenge(m) = out else {
            panic!("wrong variant");
        };
        assert_eq!(m.session_types, 0b0101);
        assert_eq!(m.facts.version.to_string(), "2.7.1");
        assert_eq!(m.facts.computer_name, "workstation-04");
        assert_eq!(m.facts.cpu_cores, 16);
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(matches!(
            Message::decode(&[0x99]),
            Err(BeamPeerError::UnknownMessageTag(0x99))
        ));
    }

    #[test]
    fn truncated_message_rejected() {
        let encoded = Message::SrpIdentify(SrpIdentify {
            username: "alice".into(),
        })
        .encode();
        for cut in 0..encoded.len() {
            assert!(Message::decode(&encoded[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut encoded = Message::ServerHello(ServerHello {
            encryption: 0x01,
            iv: vec![0u8; 12],
        })
        .encode();
        encoded.push(0x00);
        assert!(Message::decode(&encoded).is_err());
    }

    #[test]
    fn bad_iv_length_rejected() {
        let mut hello = ClientHello {
            encryption: 0x01,
            identify: 1,
            public_key: vec![0xAB; 32],
            iv: vec![0x01; 11],
        };
        let encoded = Message::ClientHello(hello.clone()).encode();
        assert!(Message::decode(&encoded).is_err());
        hello.iv = vec![0x01; 13];
        assert!(Message::decode(&Message::ClientHello(hello).encode()).is_err());
    }

    #[test]
    fn invalid_utf8_username_rejected() {
        // tag + u16 length + two invalid bytes
        let raw = [0x03, 0x00, 0x02, 0xFF, 0xFE];
        assert!(Message::decode(&raw).is_err());
    }

    #[test]
    fn identify_wire_values() {
        assert_eq!(Identify::from_wire(1), Some(Identify::Srp));
        assert_eq!(Identify::from_wire(2), Some(Identify::Anonymous));
        assert_eq!(Identify::from_wire(0), None);
        assert_eq!(Identify::from_wire(3), None);
    }
}
