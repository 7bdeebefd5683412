//! INF sidecar records, as used by BBC Micro emulators and disk image tools
//! to carry the load and execution addresses that host filesystems can't.

use std::fmt;
use std::io;

/// Appended to a file's name to form its sidecar's name.
pub const INF_SUFFIX: &str = ".inf";

/// Files extracted from tape are placed in the root directory, `$`.
const DIRECTORY_PREFIX: &str = "$.";
const NEXT_KEYWORD: &str = "NEXT";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InfRecord {
    pub name: String,
    pub load_address: u32,
    pub exec_address: u32,
    pub length: u32,
    /// The file that followed this one on tape, if any.
    pub next: Option<String>,
}

impl InfRecord {
    pub fn new(name: &str, load_address: u32, exec_address: u32) -> InfRecord {
        InfRecord {
            name: name.to_string(),
            load_address,
            exec_address,
            length: 0,
            next: None,
        }
    }

    /// The sidecar filename for a file.
    pub fn filename(name: &str) -> String {
        format!("{}{}", name, INF_SUFFIX)
    }

    /// The part of the record known when the file is opened.
    pub fn header(&self) -> String {
        format!(
            "{}{}\t{:X}\t{:X}\t",
            DIRECTORY_PREFIX, self.name, self.load_address, self.exec_address
        )
    }

    /// The part of the record known only once the file is complete.
    pub fn trailer(&self) -> String {
        match self.next {
            Some(ref next) => format!(
                "{:X}\t{} {}{}\n",
                self.length, NEXT_KEYWORD, DIRECTORY_PREFIX, next
            ),
            None => format!("{:X}\n", self.length),
        }
    }

    /// Parse a sidecar line.
    pub fn parse(line: &str) -> io::Result<InfRecord> {
        let invalid = || io::Error::new(io::ErrorKind::InvalidData, format!("bad INF record: {:?}", line));
        let hex = |s: &str| u32::from_str_radix(s, 16).map_err(|_| invalid());

        let mut fields = line.trim_end_matches(&['\r', '\n'][..]).split('\t');
        let name = fields.next().ok_or_else(invalid)?;
        let name = name.strip_prefix(DIRECTORY_PREFIX).unwrap_or(name);
        let load_address = hex(fields.next().ok_or_else(invalid)?)?;
        let exec_address = hex(fields.next().ok_or_else(invalid)?)?;
        let length = hex(fields.next().ok_or_else(invalid)?)?;
        let next = match fields.next() {
            Some(field) => {
                let next = field
                    .strip_prefix(NEXT_KEYWORD)
                    .map(str::trim_start)
                    .ok_or_else(invalid)?;
                Some(next.strip_prefix(DIRECTORY_PREFIX).unwrap_or(next).to_string())
            }
            None => None,
        };
        if fields.next().is_some() {
            return Err(invalid());
        }
        Ok(InfRecord {
            name: name.to_string(),
            load_address,
            exec_address,
            length,
            next,
        })
    }
}

impl fmt::Display for InfRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.header(), self.trailer().trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_record() {
        let mut record = InfRecord::new("CODE", 0x1900, 0x8023);
        record.length = 0x2a0;
        assert_eq!(record.header(), "$.CODE\t1900\t8023\t");
        assert_eq!(record.trailer(), "2A0\n");
        assert_eq!(record.to_string(), "$.CODE\t1900\t8023\t2A0");
        assert_eq!(InfRecord::filename("CODE"), "CODE.inf");
    }

    #[test]
    fn test_chained_record() {
        let mut record = InfRecord::new("LOADER", 0xffff0e00, 0xffff0e00);
        record.length = 0x100;
        record.next = Some("GAME".to_string());
        assert_eq!(
            format!("{}{}", record.header(), record.trailer()),
            "$.LOADER\tFFFF0E00\tFFFF0E00\t100\tNEXT $.GAME\n"
        );
    }

    #[test]
    fn test_zero_length() {
        let record = InfRecord::new("EMPTY", 0, 0);
        assert_eq!(record.to_string(), "$.EMPTY\t0\t0\t0");
    }

    #[test]
    fn test_parse() {
        let record = InfRecord::parse("$.LOADER\tFFFF0E00\tFFFF0E00\t100\tNEXT $.GAME\n").unwrap();
        assert_eq!(record.name, "LOADER");
        assert_eq!(record.load_address, 0xffff0e00);
        assert_eq!(record.length, 0x100);
        assert_eq!(record.next.as_deref(), Some("GAME"));

        let record = InfRecord::parse("$.CODE\t1900\t8023\t2A0").unwrap();
        assert_eq!(record.next, None);
        assert_eq!(record.length, 0x2a0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(InfRecord::parse("").is_err());
        assert!(InfRecord::parse("$.CODE\t1900\t8023").is_err());
        assert!(InfRecord::parse("$.CODE\t1900\tZZZZ\t10").is_err());
        assert!(InfRecord::parse("$.CODE\t1900\t8023\t10\tLATER $.X").is_err());
    }
}
