//! Strongly-typed identifiers.
//!
//! Shape ids and relationship ids are allocated from separate registries and
//! must never be compared with each other, so each family has its own type.

use std::fmt;

pub use crate::ooxml::opc::RelationshipId;

/// Package-wide unique identifier of a drawable object (`cNvPr/@id`).
///
/// Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(u32);

impl ShapeId {
    pub const MIN: ShapeId = ShapeId(1);

    /// Wrap a raw id; `None` for zero.
    pub const fn new(id: u32) -> Option<Self> {
        if id == 0 { None } else { Some(Self(id)) }
    }

    /// Parse a decimal attribute token. Non-numeric, negative and zero tokens
    /// yield `None`.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        atoi_simd::parse::<u32, false, false>(token.as_bytes())
            .ok()
            .and_then(Self::new)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = itoa::Buffer::new();
        f.write_str(buf.format(self.0))
    }
}
