//! pkt-line framing and the smart-protocol reference advertisement.
//!
//! A pkt-line is four lowercase hex digits giving the total length
//! (header included) followed by the payload; `0000` is a flush packet.
//! The advertisement is one `<oid> SP <name>` line per reference, with the
//! capability list after a NUL on the first line, terminated by a flush.

use oxgit_types::{Oid, OID_HEX_LEN};

use crate::error::{RemoteError, RemoteResult};

/// Largest payload a single pkt-line may carry.
pub const MAX_PKT_PAYLOAD: usize = 65516;

/// Name used on the sole line of an empty repository's advertisement.
const NO_REFS: &str = "capabilities^{}";

/// One decoded packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pkt<'a> {
    Flush,
    Data(&'a [u8]),
}

pub fn write_pkt(out: &mut Vec<u8>, payload: &[u8]) -> RemoteResult<()> {
    if payload.len() > MAX_PKT_PAYLOAD {
        return Err(RemoteError::protocol(format!(
            "pkt-line payload of {} bytes exceeds {MAX_PKT_PAYLOAD}",
            payload.len()
        )));
    }
    out.extend_from_slice(format!("{:04x}", payload.len() + 4).as_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

pub fn write_flush(out: &mut Vec<u8>) {
    out.extend_from_slice(b"0000");
}

/// Decode the packet at the start of `input`, returning it and the number
/// of bytes it occupied.
pub fn read_pkt(input: &[u8]) -> RemoteResult<(Pkt<'_>, usize)> {
    let header = input
        .get(..4)
        .ok_or_else(|| RemoteError::protocol("truncated pkt-line header"))?;
    let header = std::str::from_utf8(header)
        .ok()
        .and_then(|h| usize::from_str_radix(h, 16).ok())
        .ok_or_else(|| RemoteError::protocol("pkt-line header is not hex"))?;
    match header {
        0 => Ok((Pkt::Flush, 4)),
        1..=3 => Err(RemoteError::protocol(format!("invalid pkt-line length {header}"))),
        len => {
            let payload = input.get(4..len).ok_or_else(|| {
                RemoteError::protocol(format!(
                    "pkt-line wants {len} bytes, only {} available",
                    input.len()
                ))
            })?;
            Ok((Pkt::Data(payload), len))
        }
    }
}

/// Iterator over the packets of a buffer. Stops after the first error.
pub struct PktReader<'a> {
    input: &'a [u8],
    failed: bool,
}

impl<'a> PktReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, failed: false }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        self.input
    }
}

impl<'a> Iterator for PktReader<'a> {
    type Item = RemoteResult<Pkt<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.input.is_empty() {
            return None;
        }
        match read_pkt(self.input) {
            Ok((pkt, used)) => {
                self.input = &self.input[used..];
                Some(Ok(pkt))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// A reference as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvertisedRef {
    pub oid: Oid,
    pub name: String,
}

impl AdvertisedRef {
    pub fn new(oid: Oid, name: impl Into<String>) -> Self {
        Self { oid, name: name.into() }
    }
}

/// The reference list and capabilities a server sends on connect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Advertisement {
    pub refs: Vec<AdvertisedRef>,
    pub capabilities: Vec<String>,
}

impl Advertisement {
    /// Target of `name` announced through a `symref=<name>:<target>`
    /// capability.
    pub fn symref(&self, name: &str) -> Option<&str> {
        self.capabilities.iter().find_map(|cap| {
            let (from, to) = cap.strip_prefix("symref=")?.split_once(':')?;
            (from == name).then_some(to)
        })
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities
            .iter()
            .any(|cap| cap == name || cap.split_once('=').is_some_and(|(key, _)| key == name))
    }

    pub fn encode(&self) -> RemoteResult<Vec<u8>> {
        let caps = self.capabilities.join(" ");
        let mut out = Vec::new();
        if self.refs.is_empty() {
            let line = format!("{} {NO_REFS}\0{caps}\n", Oid::zero());
            write_pkt(&mut out, line.as_bytes())?;
        }
        for (i, r) in self.refs.iter().enumerate() {
            let line = if i == 0 {
                format!("{} {}\0{caps}\n", r.oid, r.name)
            } else {
                format!("{} {}\n", r.oid, r.name)
            };
            write_pkt(&mut out, line.as_bytes())?;
        }
        write_flush(&mut out);
        Ok(out)
    }

    /// Decode an advertisement up to and including its flush packet.
    ///
    /// A leading `# service=...` announcement and its flush, as sent over
    /// smart HTTP, are skipped.
    pub fn decode(input: &[u8]) -> RemoteResult<Self> {
        let mut advert = Self::default();
        let mut first = true;
        let mut in_service_banner = false;

        for pkt in PktReader::new(input) {
            let line = match pkt? {
                Pkt::Flush if in_service_banner => {
                    in_service_banner = false;
                    continue;
                }
                Pkt::Flush => return Ok(advert),
                Pkt::Data(line) => line,
            };
            let line = line.strip_suffix(b"\n").unwrap_or(line);
            if first && line.starts_with(b"# service=") {
                in_service_banner = true;
                continue;
            }
            if line == b"version 1" {
                continue;
            }

            let (body, caps) = match line.iter().position(|&b| b == 0) {
                Some(nul) => (&line[..nul], Some(&line[nul + 1..])),
                None => (line, None),
            };
            if let Some(caps) = caps {
                if !first {
                    return Err(RemoteError::protocol("capabilities after the first line"));
                }
                let caps = std::str::from_utf8(caps)
                    .map_err(|_| RemoteError::protocol("capabilities are not UTF-8"))?;
                advert.capabilities = caps.split_whitespace().map(str::to_string).collect();
            }

            let r = parse_ref_line(body)?;
            if !(first && r.name == NO_REFS && r.oid.is_zero()) {
                advert.refs.push(r);
            }
            first = false;
        }
        Err(RemoteError::protocol("advertisement ended without a flush packet"))
    }
}

fn parse_ref_line(body: &[u8]) -> RemoteResult<AdvertisedRef> {
    let body = std::str::from_utf8(body)
        .map_err(|_| RemoteError::protocol("reference line is not UTF-8"))?;
    let (hex, name) = body
        .split_once(' ')
        .ok_or_else(|| RemoteError::protocol(format!("malformed reference line {body:?}")))?;
    if hex.len() != OID_HEX_LEN || name.is_empty() {
        return Err(RemoteError::protocol(format!("malformed reference line {body:?}")));
    }
    let oid = Oid::from_hex(hex)
        .map_err(|e| RemoteError::protocol(format!("bad object id {hex:?}: {e}")))?;
    Ok(AdvertisedRef::new(oid, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0";
    const B: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

    fn oid(hex: &str) -> Oid {
        Oid::from_hex(hex).unwrap()
    }

    // -----------------------------------------------------------------------
    // Framing
    // -----------------------------------------------------------------------

    #[test]
    fn frames_and_flush() {
        let mut out = Vec::new();
        write_pkt(&mut out, b"hello\n").unwrap();
        write_flush(&mut out);
        assert_eq!(out, b"000ahello\n0000");

        let pkts: Vec<_> = PktReader::new(&out).collect::<RemoteResult<_>>().unwrap();
        assert_eq!(pkts, [Pkt::Data(b"hello\n"), Pkt::Flush]);
    }

    #[test]
    fn bad_frames() {
        assert!(read_pkt(b"00").is_err());
        assert!(read_pkt(b"zzzz").is_err());
        assert!(read_pkt(b"0002").is_err());
        assert!(read_pkt(b"0010short").is_err());
        assert!(write_pkt(&mut Vec::new(), &vec![b'x'; MAX_PKT_PAYLOAD + 1]).is_err());
    }

    // -----------------------------------------------------------------------
    // Advertisement
    // -----------------------------------------------------------------------

    #[test]
    fn capabilities_ride_on_first_line() {
        let advert = Advertisement {
            refs: vec![AdvertisedRef::new(oid(A), "HEAD"), AdvertisedRef::new(oid(B), "refs/heads/main")],
            capabilities: vec!["ofs-delta".into(), "symref=HEAD:refs/heads/main".into()],
        };
        let bytes = advert.encode().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with(&format!("{:04x}{A} HEAD\0ofs-delta symref=HEAD:refs/heads/main\n", 4 + 41 + 5 + 38)));
        assert!(text.ends_with("0000"));

        let decoded = Advertisement::decode(&bytes).unwrap();
        assert_eq!(decoded, advert);
        assert_eq!(decoded.symref("HEAD"), Some("refs/heads/main"));
        assert!(decoded.has_capability("symref"));
        assert!(decoded.has_capability("ofs-delta"));
        assert!(!decoded.has_capability("thin-pack"));
    }

    #[test]
    fn empty_repository_advertises_nothing() {
        let advert = Advertisement { refs: vec![], capabilities: vec!["agent=x".into()] };
        let bytes = advert.encode().unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("capabilities^{}"));
        let decoded = Advertisement::decode(&bytes).unwrap();
        assert!(decoded.refs.is_empty());
        assert_eq!(decoded.capabilities, ["agent=x"]);
    }

    #[test]
    fn http_service_banner_is_skipped() {
        let mut bytes = Vec::new();
        write_pkt(&mut bytes, b"# service=git-upload-pack\n").unwrap();
        write_flush(&mut bytes);
        write_pkt(&mut bytes, format!("{A} refs/heads/main\0multi_ack\n").as_bytes()).unwrap();
        write_flush(&mut bytes);
        let decoded = Advertisement::decode(&bytes).unwrap();
        assert_eq!(decoded.refs, [AdvertisedRef::new(oid(A), "refs/heads/main")]);
        assert_eq!(decoded.capabilities, ["multi_ack"]);
    }

    #[test]
    fn malformed_advertisements() {
        let mut missing_flush = Vec::new();
        write_pkt(&mut missing_flush, format!("{A} HEAD\n").as_bytes()).unwrap();
        assert!(Advertisement::decode(&missing_flush).is_err());

        let mut bad_oid = Vec::new();
        write_pkt(&mut bad_oid, b"nothex HEAD\n").unwrap();
        write_flush(&mut bad_oid);
        let err = Advertisement::decode(&bad_oid).unwrap_err();
        assert_eq!(err.kind(), oxgit_types::ErrorKind::Corrupt);

        let mut late_caps = Vec::new();
        write_pkt(&mut late_caps, format!("{A} HEAD\n").as_bytes()).unwrap();
        write_pkt(&mut late_caps, format!("{B} refs/heads/x\0caps\n").as_bytes()).unwrap();
        write_flush(&mut late_caps);
        assert!(Advertisement::decode(&late_caps).is_err());
    }
}
