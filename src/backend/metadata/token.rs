//! Metadata tokens
//!
//! A token is a 32-bit reference into one of a module's metadata tables: the
//! high byte selects the table, the low 24 bits select the row (1-based).

use std::fmt;

/// Metadata table selector (high byte of a token)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenTable {
    /// Reference to a type defined in another module
    TypeRef = 0x01,
    /// Type defined in this module
    TypeDef = 0x02,
    /// Field definition
    Field = 0x04,
    /// Method definition
    MethodDef = 0x06,
    /// Member reference (possibly on a generic instantiation)
    MemberRef = 0x0A,
    /// Type specification (generic instantiation, array, ...)
    TypeSpec = 0x1B,
    /// Generic method instantiation
    MethodSpec = 0x2B,
    /// User string heap offset (used by `ldstr`)
    UserString = 0x70,
}

impl TokenTable {
    /// Convert a table byte to a table, returns None if unknown
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::TypeRef),
            0x02 => Some(Self::TypeDef),
            0x04 => Some(Self::Field),
            0x06 => Some(Self::MethodDef),
            0x0A => Some(Self::MemberRef),
            0x1B => Some(Self::TypeSpec),
            0x2B => Some(Self::MethodSpec),
            0x70 => Some(Self::UserString),
            _ => None,
        }
    }
}

/// A metadata token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// Build a token from a table and a 1-based row
    #[inline]
    pub fn new(table: TokenTable, row: u32) -> Self {
        debug_assert!(row <= 0x00FF_FFFF, "token row out of range");
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Raw table byte
    #[inline]
    pub fn table_byte(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Table this token points into, if it is a known table
    #[inline]
    pub fn table(self) -> Option<TokenTable> {
        TokenTable::from_byte(self.table_byte())
    }

    /// Row within the table
    #[inline]
    pub fn row(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Reinterpret the token as the signed 32-bit value found in the stream
    #[inline]
    pub fn as_i32(self) -> i32 {
        self.0 as i32
    }
}

impl From<u32> for Token {
    fn from(raw: u32) -> Self {
        Token(raw)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
