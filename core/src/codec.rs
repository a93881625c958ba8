//! Primitive readers and writers for the binary dumps.
//!
//! The lexicon, synonym and response dumps are little-endian, the chat corpus
//! is big-endian. Strings are stored NUL-terminated in one of three encodings:
//! UTF-16LE (lexicon keys, synonyms), UTF-8 (responses) and GBK (chat corpus).

use std::io::{BufRead, ErrorKind, Read, Write};

use encoding_rs::GBK;

use crate::error::{Error, Result};

pub fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Look at the next byte without consuming it. `None` at end of stream.
pub fn peek_u8<R: BufRead>(r: &mut R) -> Result<Option<u8>> {
    loop {
        match r.fill_buf() {
            Ok(buf) => return Ok(buf.first().copied()),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

macro_rules! fixed_width {
    ($read_le:ident, $read_be:ident, $write_le:ident, $write_be:ident, $ty:ty) => {
        pub fn $read_le<R: Read>(r: &mut R) -> Result<$ty> {
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            r.read_exact(&mut buf)?;
            Ok(<$ty>::from_le_bytes(buf))
        }

        pub fn $read_be<R: Read>(r: &mut R) -> Result<$ty> {
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            r.read_exact(&mut buf)?;
            Ok(<$ty>::from_be_bytes(buf))
        }

        pub fn $write_le<W: Write>(w: &mut W, value: $ty) -> Result<()> {
            w.write_all(&value.to_le_bytes())?;
            Ok(())
        }

        pub fn $write_be<W: Write>(w: &mut W, value: $ty) -> Result<()> {
            w.write_all(&value.to_be_bytes())?;
            Ok(())
        }
    };
}

fixed_width!(read_u16_le, read_u16_be, write_u16_le, write_u16_be, u16);
fixed_width!(read_i16_le, read_i16_be, write_i16_le, write_i16_be, i16);
fixed_width!(read_i32_le, read_i32_be, write_i32_le, write_i32_be, i32);
fixed_width!(read_f64_le, read_f64_be, write_f64_le, write_f64_be, f64);

pub fn write_u8<W: Write>(w: &mut W, value: u8) -> Result<()> {
    w.write_all(&[value])?;
    Ok(())
}

/// Read a count stored as a signed 32-bit integer, rejecting negatives.
pub fn read_count_le<R: Read>(r: &mut R, format: &'static str) -> Result<usize> {
    let n = read_i32_le(r)?;
    usize::try_from(n).map_err(|_| Error::corrupt(format, format!("negative count {n}")))
}

pub fn read_count_be<R: Read>(r: &mut R, format: &'static str) -> Result<usize> {
    let n = read_i32_be(r)?;
    usize::try_from(n).map_err(|_| Error::corrupt(format, format!("negative count {n}")))
}

/// Convert a length to the i32 used by the count fields.
pub fn count_to_i32(what: &'static str, n: usize) -> Result<i32> {
    Error::check_width(what, n, i32::MAX as usize)?;
    Ok(n as i32)
}

// ---- NUL-terminated byte strings ----

pub fn read_cbytes<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        match read_u8(r)? {
            0 => return Ok(out),
            b => out.push(b),
        }
    }
}

pub fn write_cbytes<W: Write>(w: &mut W, bytes: &[u8]) -> Result<()> {
    w.write_all(bytes)?;
    w.write_all(&[0])?;
    Ok(())
}

pub fn read_utf8z<R: Read>(r: &mut R) -> Result<String> {
    let bytes = read_cbytes(r)?;
    String::from_utf8(bytes).map_err(|e| Error::Encoding {
        encoding: "UTF-8",
        direction: "decode",
        text: String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

pub fn write_utf8z<W: Write>(w: &mut W, s: &str) -> Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(Error::Encoding {
            encoding: "UTF-8",
            direction: "encode",
            text: s.to_string(),
        });
    }
    write_cbytes(w, s.as_bytes())
}

// ---- GBK ----

pub fn gbk_encode(s: &str) -> Result<Vec<u8>> {
    let (bytes, _, had_errors) = GBK.encode(s);
    if had_errors || bytes.contains(&0) {
        return Err(Error::Encoding {
            encoding: "GBK",
            direction: "encode",
            text: s.to_string(),
        });
    }
    Ok(bytes.into_owned())
}

pub fn gbk_decode(bytes: &[u8]) -> Result<String> {
    GBK.decode_without_bom_handling_and_without_replacement(bytes)
        .map(|s| s.into_owned())
        .ok_or_else(|| Error::Encoding {
            encoding: "GBK",
            direction: "decode",
            text: String::from_utf8_lossy(bytes).into_owned(),
        })
}

pub fn read_gbkz<R: Read>(r: &mut R) -> Result<String> {
    let bytes = read_cbytes(r)?;
    gbk_decode(&bytes)
}

pub fn write_gbkz<W: Write>(w: &mut W, s: &str) -> Result<()> {
    let bytes = gbk_encode(s)?;
    write_cbytes(w, &bytes)
}

/// Decode source text: UTF-8 first, GBK when the bytes are not valid UTF-8.
pub fn decode_source(bytes: &[u8]) -> Result<String> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.trim_start_matches('\u{feff}').to_string()),
        Err(_) => gbk_decode(bytes),
    }
}

// ---- UTF-16LE ----

fn decode_utf16(units: &[u16]) -> Result<String> {
    String::from_utf16(units).map_err(|_| Error::Encoding {
        encoding: "UTF-16",
        direction: "decode",
        text: String::from_utf16_lossy(units),
    })
}

/// Read UTF-16LE code units up to (and consuming) a 0x0000 terminator.
pub fn read_utf16z<R: Read>(r: &mut R) -> Result<String> {
    let mut units = Vec::new();
    loop {
        match read_u16_le(r)? {
            0 => break,
            u => units.push(u),
        }
    }
    decode_utf16(&units)
}

/// Read one UTF-16LE code unit and then, if `single` rejects it, the rest of
/// a 0x0000-terminated string. Used by the lexicon, whose CJK keys are stored
/// as a bare code unit.
pub fn read_utf16_key<R: Read>(r: &mut R, single: impl Fn(u16) -> bool) -> Result<String> {
    let first = read_u16_le(r)?;
    if single(first) {
        return decode_utf16(&[first]);
    }
    let mut units = Vec::new();
    let mut next = first;
    while next != 0 {
        units.push(next);
        next = read_u16_le(r)?;
    }
    decode_utf16(&units)
}

pub fn write_utf16<W: Write>(w: &mut W, s: &str) -> Result<()> {
    for unit in s.encode_utf16() {
        if unit == 0 {
            return Err(Error::Encoding {
                encoding: "UTF-16",
                direction: "encode",
                text: s.to_string(),
            });
        }
        write_u16_le(w, unit)?;
    }
    Ok(())
}

pub fn write_utf16z<W: Write>(w: &mut W, s: &str) -> Result<()> {
    write_utf16(w, s)?;
    write_u16_le(w, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn integers_keep_their_byte_order() {
        let mut buf = Vec::new();
        write_i32_le(&mut buf, 0x0102_0304).unwrap();
        write_i32_be(&mut buf, 0x0102_0304).unwrap();
        assert_eq!(buf, vec![4, 3, 2, 1, 1, 2, 3, 4]);

        let mut r = Cursor::new(buf);
        assert_eq!(read_i32_le(&mut r).unwrap(), 0x0102_0304);
        assert_eq!(read_i32_be(&mut r).unwrap(), 0x0102_0304);
    }

    #[test]
    fn gbk_strings_are_nul_terminated() {
        let mut buf = Vec::new();
        write_gbkz(&mut buf, "你好").unwrap();
        assert_eq!(buf, vec![0xC4, 0xE3, 0xBA, 0xC3, 0x00]);
        assert_eq!(read_gbkz(&mut Cursor::new(buf)).unwrap(), "你好");
    }

    #[test]
    fn gbk_rejects_unmappable_text() {
        assert!(matches!(gbk_encode("🙂"), Err(Error::Encoding { .. })));
    }

    #[test]
    fn utf16_key_single_unit() {
        let mut buf = Vec::new();
        write_u16_le(&mut buf, '好' as u16).unwrap();
        write_utf16z(&mut buf, "abc").unwrap();
        let mut r = Cursor::new(buf);
        let cjk = |u: u16| u >= 0x3400 && u <= 0x9FD5;
        assert_eq!(read_utf16_key(&mut r, cjk).unwrap(), "好");
        assert_eq!(read_utf16_key(&mut r, cjk).unwrap(), "abc");
    }

    #[test]
    fn truncated_input_is_eof() {
        let mut r = Cursor::new(vec![b'a', b'b']);
        match read_cbytes(&mut r) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), ErrorKind::UnexpectedEof),
            other => panic!("expected eof, got {other:?}"),
        }
    }

    #[test]
    fn peek_does_not_consume() {
        let mut r = Cursor::new(vec![0xFE]);
        assert_eq!(peek_u8(&mut r).unwrap(), Some(0xFE));
        assert_eq!(read_u8(&mut r).unwrap(), 0xFE);
        assert_eq!(peek_u8(&mut r).unwrap(), None);
    }

    #[test]
    fn source_decoding_falls_back_to_gbk() {
        assert_eq!(decode_source("你好".as_bytes()).unwrap(), "你好");
        assert_eq!(decode_source(&[0xC4, 0xE3, 0xBA, 0xC3]).unwrap(), "你好");
    }
}
