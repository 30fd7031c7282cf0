//! Minimal OSC 1.0 message codec for OSC ports.
//!
//! Only single messages (no bundles) with `i`, `f`, `s`, `T` and `F`
//! arguments. Both directions work on caller buffers and never allocate, so
//! the processing thread can use them on packets from [`OscPort`](crate::OscPort).

use crate::Status;

/// One message argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OscValue<'a> {
    Int(i32),
    Float(f32),
    Str(&'a str),
    Bool(bool),
}

impl OscValue<'_> {
    fn tag(&self) -> u8 {
        match self {
            OscValue::Int(_) => b'i',
            OscValue::Float(_) => b'f',
            OscValue::Str(_) => b's',
            OscValue::Bool(true) => b'T',
            OscValue::Bool(false) => b'F',
        }
    }
}

#[inline]
fn padded(len: usize) -> usize {
    (len + 4) & !3
}

struct Cursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn put(&mut self, bytes: &[u8]) -> Result<(), Status> {
        let end = self.pos + bytes.len();
        let dst = self.buf.get_mut(self.pos..end).ok_or(Status::Overflow)?;
        dst.copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    /// NUL-terminated, padded to four bytes.
    fn put_str(&mut self, s: &[u8]) -> Result<(), Status> {
        let end = self.pos + padded(s.len());
        let dst = self.buf.get_mut(self.pos..end).ok_or(Status::Overflow)?;
        dst[..s.len()].copy_from_slice(s);
        dst[s.len()..].fill(0);
        self.pos = end;
        Ok(())
    }
}

/// Encode a message into `buf`. Returns the packet length.
pub fn forge(buf: &mut [u8], address: &str, args: &[OscValue<'_>]) -> Result<usize, Status> {
    if !address.starts_with('/') || address.contains('\0') {
        return Err(Status::BadArguments);
    }

    let mut cur = Cursor { buf, pos: 0 };
    cur.put_str(address.as_bytes())?;

    // Type tags: ',' + one per argument
    let tags_len = args.len() + 1;
    let end = cur.pos + padded(tags_len);
    let tags = cur.buf.get_mut(cur.pos..end).ok_or(Status::Overflow)?;
    tags.fill(0);
    tags[0] = b',';
    for (slot, arg) in tags[1..].iter_mut().zip(args) {
        *slot = arg.tag();
    }
    cur.pos = end;

    for arg in args {
        match arg {
            OscValue::Int(v) => cur.put(&v.to_be_bytes())?,
            OscValue::Float(v) => cur.put(&v.to_be_bytes())?,
            OscValue::Str(s) => {
                if s.contains('\0') {
                    return Err(Status::BadArguments);
                }
                cur.put_str(s.as_bytes())?
            }
            OscValue::Bool(_) => {}
        }
    }
    Ok(cur.pos)
}

/// A decoded message borrowing from its packet.
#[derive(Debug, Clone, Copy)]
pub struct OscMessage<'a> {
    pub address: &'a str,
    tags: &'a [u8],
    data: &'a [u8],
}

/// Read a padded NUL-terminated string at `pos`. Returns it and the next offset.
fn read_str(packet: &[u8], pos: usize) -> Result<(&str, usize), Status> {
    let rest = packet.get(pos..).ok_or(Status::BadArguments)?;
    let len = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(Status::BadArguments)?;
    let s = std::str::from_utf8(&rest[..len]).map_err(|_| Status::BadArguments)?;
    let next = pos + padded(len);
    if next > packet.len() {
        return Err(Status::BadArguments);
    }
    Ok((s, next))
}

/// Decode a single message. Bundles and unknown tags are rejected.
pub fn parse(packet: &[u8]) -> Result<OscMessage<'_>, Status> {
    if packet.len() % 4 != 0 {
        return Err(Status::BadArguments);
    }
    let (address, pos) = read_str(packet, 0)?;
    if !address.starts_with('/') {
        return Err(Status::BadArguments);
    }
    let (tags, pos) = read_str(packet, pos)?;
    let tags = tags.as_bytes();
    if tags.first() != Some(&b',') {
        return Err(Status::BadArguments);
    }
    let msg = OscMessage {
        address,
        tags: &tags[1..],
        data: &packet[pos..],
    };
    // Validate the payload once so iteration cannot fail
    for arg in msg.try_args() {
        arg?;
    }
    Ok(msg)
}

impl<'a> OscMessage<'a> {
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Arguments in order.
    pub fn args(&self) -> impl Iterator<Item = OscValue<'a>> + 'a {
        self.try_args().map_while(|a| a.ok())
    }

    pub fn arg(&self, index: usize) -> Option<OscValue<'a>> {
        self.args().nth(index)
    }

    fn try_args(&self) -> impl Iterator<Item = Result<OscValue<'a>, Status>> + 'a {
        let data = self.data;
        let tags: &'a [u8] = self.tags;
        let mut pos = 0usize;
        tags.iter().map(move |&tag| {
            let word = |pos: usize| -> Result<[u8; 4], Status> {
                data.get(pos..pos + 4)
                    .and_then(|w| w.try_into().ok())
                    .ok_or(Status::BadArguments)
            };
            match tag {
                b'i' => {
                    let v = i32::from_be_bytes(word(pos)?);
                    pos += 4;
                    Ok(OscValue::Int(v))
                }
                b'f' => {
                    let v = f32::from_be_bytes(word(pos)?);
                    pos += 4;
                    Ok(OscValue::Float(v))
                }
                b's' => {
                    let (s, next) = read_str(data, pos)?;
                    pos = next;
                    Ok(OscValue::Str(s))
                }
                b'T' => Ok(OscValue::Bool(true)),
                b'F' => Ok(OscValue::Bool(false)),
                _ => Err(Status::BadArguments),
            }
        })
    }
}
