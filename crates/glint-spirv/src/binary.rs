//! Read-only access to SPIR-V binaries: header decoding and instruction
//! iteration. Used to inspect generated modules and `.spv` files.

use std::fmt;

use rspirv::spirv::{self, Op};

/// The five-word module header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    /// `0x00MMmm00`: major and minor version.
    pub version: u32,
    pub generator: u32,
    /// Every id in the module is below this bound.
    pub bound: u32,
    pub schema: u32,
}

impl Header {
    pub fn version_pair(&self) -> (u8, u8) {
        ((self.version >> 16) as u8, (self.version >> 8) as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryError {
    /// Byte length is not a multiple of four.
    Unaligned(usize),
    /// Fewer than five words.
    Truncated,
    BadMagic(u32),
    /// An instruction's word count is zero or runs past the end.
    BadInstruction { offset: usize },
}

impl fmt::Display for BinaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryError::Unaligned(n) => write!(f, "binary length {} is not a multiple of 4", n),
            BinaryError::Truncated => write!(f, "binary is shorter than the 5-word header"),
            BinaryError::BadMagic(m) => write!(f, "bad magic number {:#010x}", m),
            BinaryError::BadInstruction { offset } => {
                write!(f, "malformed instruction at word {}", offset)
            }
        }
    }
}

impl std::error::Error for BinaryError {}

/// Decode little- or big-endian bytes into words, using the magic number to
/// detect the byte order.
pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u32>, BinaryError> {
    if bytes.len() % 4 != 0 {
        return Err(BinaryError::Unaligned(bytes.len()));
    }
    let mut words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if words.first() == Some(&spirv::MAGIC_NUMBER.swap_bytes()) {
        for w in &mut words {
            *w = w.swap_bytes();
        }
    }
    Ok(words)
}

pub fn parse_header(words: &[u32]) -> Result<Header, BinaryError> {
    let [magic, version, generator, bound, schema, ..] = *words else {
        return Err(BinaryError::Truncated);
    };
    if magic != spirv::MAGIC_NUMBER {
        return Err(BinaryError::BadMagic(magic));
    }
    Ok(Header {
        magic,
        version,
        generator,
        bound,
        schema,
    })
}

/// One instruction: its opcode and the operand words that follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction<'a> {
    pub opcode: u16,
    pub operands: &'a [u32],
}

impl Instruction<'_> {
    pub fn op(&self) -> Option<Op> {
        Op::from_u32(self.opcode as u32)
    }
}

/// Iterator over the instructions after the header.
pub struct Instructions<'a> {
    words: &'a [u32],
    offset: usize,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, BinaryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = *self.words.get(self.offset)?;
        let count = (first >> 16) as usize;
        let end = self.offset + count;
        if count == 0 || end > self.words.len() {
            let offset = self.offset;
            self.offset = self.words.len();
            return Some(Err(BinaryError::BadInstruction { offset }));
        }
        let inst = Instruction {
            opcode: (first & 0xffff) as u16,
            operands: &self.words[self.offset + 1..end],
        };
        self.offset = end;
        Some(Ok(inst))
    }
}

/// Instructions of a whole module, header excluded.
pub fn instructions(words: &[u32]) -> Instructions<'_> {
    Instructions {
        words,
        offset: 5.min(words.len()),
    }
}

/// Decode a literal string operand (nul-terminated, little-endian packed).
pub fn literal_string(operands: &[u32]) -> String {
    let mut bytes = Vec::new();
    'words: for w in operands {
        for b in w.to_le_bytes() {
            if b == 0 {
                break 'words;
            }
            bytes.push(b);
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::string_words;

    #[test]
    fn byte_order_is_detected() {
        let words = [spirv::MAGIC_NUMBER, 0x0001_0000, 0, 1, 0];
        let le: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let be: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        assert_eq!(words_from_bytes(&le).unwrap(), words);
        assert_eq!(words_from_bytes(&be).unwrap(), words);
        assert_eq!(words_from_bytes(&le[..7]), Err(BinaryError::Unaligned(7)));
    }

    #[test]
    fn header_checks() {
        assert_eq!(parse_header(&[1, 2, 3]), Err(BinaryError::Truncated));
        assert_eq!(parse_header(&[7, 0, 0, 0, 0]), Err(BinaryError::BadMagic(7)));
        let h = parse_header(&[spirv::MAGIC_NUMBER, 0x0001_0300, 0, 9, 0]).unwrap();
        assert_eq!(h.version_pair(), (1, 3));
        assert_eq!(h.bound, 9);
    }

    #[test]
    fn iterates_and_rejects_overruns() {
        let mut words = vec![spirv::MAGIC_NUMBER, 0x0001_0000, 0, 2, 0];
        words.extend([(2 << 16) | Op::Capability as u32, 1]);
        words.push((3 << 16) | Op::TypeInt as u32);
        let all: Vec<_> = instructions(&words).collect();
        assert_eq!(all.len(), 2);
        let first = all[0].as_ref().unwrap();
        assert_eq!(first.op(), Some(Op::Capability));
        assert_eq!(first.operands, &[1]);
        assert_eq!(all[1], Err(BinaryError::BadInstruction { offset: 7 }));
    }

    #[test]
    fn strings_decode() {
        assert_eq!(literal_string(&string_words("GLSL.std.450")), "GLSL.std.450");
        assert_eq!(literal_string(&string_words("")), "");
    }
}
