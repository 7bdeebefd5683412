use std::fmt;

/// Write a hexdump of the provided byte slice.
pub fn hexdump(
    f: &mut fmt::Formatter,
    prefix: &str,
    buffer: &[u8],
) -> std::result::Result<(), std::fmt::Error> {
    const COLUMNS: usize = 16;
    let mut offset: usize = 0;
    if buffer.is_empty() {
        // For a zero-length buffer, at least print an offset instead of
        // nothing.
        write!(f, "{}{:04x}: ", prefix, 0)?;
    }
    while offset < buffer.len() {
        write!(f, "{}{:04x}: ", prefix, offset)?;

        let row_end = (offset + COLUMNS).min(buffer.len());
        let row = &buffer[offset..row_end];
        let padding = COLUMNS - row.len();

        for b in row {
            write!(f, "{:02x} ", b)?;
        }
        for _ in 0..padding {
            write!(f, "   ")?;
        }

        for b in row {
            write!(
                f,
                "{}",
                match *b {
                    c @ 0x20..=0x7E => c as char,
                    _ => '.',
                }
            )?;
        }

        offset += COLUMNS;
        if offset < buffer.len() {
            writeln!(f)?;
        }
    }
    Ok(())
}

pub struct Hex<'a>(pub &'a [u8], pub &'a str);
impl<'a> fmt::Display for Hex<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        hexdump(f, self.1, self.0)
    }
}

/// Hexdump `bytes`, starting each row with `prefix`.
pub fn hex<'a>(bytes: &'a [u8], prefix: &'a str) -> Hex<'a> {
    Hex(bytes, prefix)
}

/// Provide a convenience function for getting a byte slice based on its length
/// instead of its ending position.  Returns None if the range runs past the
/// end of the slice.
pub trait Slice {
    fn slice(&self, offset: usize, size: usize) -> Option<&[u8]>;
}

impl<'a> Slice for &'a [u8] {
    #[inline]
    fn slice(&self, offset: usize, size: usize) -> Option<&[u8]> {
        self.get(offset..offset.checked_add(size)?)
    }
}

#[inline]
pub fn le_u16(bytes: &[u8]) -> u16 {
    u16::from(bytes[0]) | u16::from(bytes[1]) << 8
}

#[inline]
pub fn le_u32(bytes: &[u8]) -> u32 {
    bytes[..4]
        .iter()
        .rev()
        .fold(0u32, |n, &b| (n << 8) | u32::from(b))
}
