//! Composite resource identities
//!
//! Resources are identified locally by the `/`-joined tuple of their parent
//! scope identifiers followed by (or preceded by) the leaf identifier, e.g.
//! `instanceID/zoneID/permittedNetworkID`.
//!
//! The last segment absorbs any further separators, so a CRN such as
//! `crn:v1:bluemix:public:internet-svcs:global:a/1234::` can be the trailing
//! part of an identity without being split.

use crate::error::{Error, Result};
use std::fmt;

/// Separator between identity segments
pub const SEPARATOR: char = '/';

/// A parsed composite identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeId {
    parts: Vec<String>,
}

impl CompositeId {
    /// Build an identity from its segments
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse an identity that must have exactly `arity` segments
    ///
    /// Fails with [`Error::IdentityParse`] when fewer segments are present or
    /// any segment is empty.
    pub fn parse(id: &str, arity: usize) -> Result<Self> {
        let parts: Vec<String> = id.splitn(arity, SEPARATOR).map(str::to_string).collect();

        if arity == 0 || parts.len() < arity || parts.iter().any(String::is_empty) {
            return Err(Error::IdentityParse {
                id: id.to_string(),
                expected: format!("{arity} non-empty '{SEPARATOR}'-separated segments"),
            });
        }

        Ok(Self { parts })
    }

    /// Parse into a fixed-size array of segments
    ///
    /// ```
    /// use cloudplane_core::identity::CompositeId;
    ///
    /// let [instance, zone, network] = CompositeId::split::<3>("i/z/n").unwrap();
    /// assert_eq!((instance.as_str(), zone.as_str(), network.as_str()), ("i", "z", "n"));
    /// ```
    pub fn split<const N: usize>(id: &str) -> Result<[String; N]> {
        let parsed = Self::parse(id, N)?;
        parsed.parts.try_into().map_err(|_| Error::IdentityParse {
            id: id.to_string(),
            expected: format!("{N} segments"),
        })
    }

    /// Segment at `index`
    pub fn part(&self, index: usize) -> Option<&str> {
        self.parts.get(index).map(String::as_str)
    }

    /// All segments in order
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the identity has no segments
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}
