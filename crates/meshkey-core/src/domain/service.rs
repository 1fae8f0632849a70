//! Service identifiers and 32-bit service masks.
//!
//! # What is a service? (for beginners)
//!
//! A *service* is a logical channel identified by a small integer in
//! `1..=32`.  A node that **registers** a service can receive data on it;
//! a node that **requests** a service wants to transmit on it.  Because
//! there are at most 32 ids, any set of services fits in one `u32`: bit
//! `id - 1` is set when `id` is a member.  The mesh stack itself speaks in
//! these masks (for example a peer advertises "I registered services
//! `0x0000_0005`", meaning ids 1 and 3).
//!
//! Masks are only ever combined within one role's directory.  Mixing a
//! registered mask into request bookkeeping is a bug; the directory types
//! keep the two roles in separate structs so that cannot happen by accident.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest valid service id.
pub const MIN_SERVICE_ID: u8 = 1;

/// Highest valid service id.
pub const MAX_SERVICE_ID: u8 = 32;

/// Number of distinct service ids; also the size of the per-service arrays.
pub const SERVICE_COUNT: usize = MAX_SERVICE_ID as usize;

/// Returned when a raw integer is not a valid service id.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("service id {0} is outside 1..=32")]
pub struct ServiceIdOutOfRange(pub u8);

// ── ServiceId ─────────────────────────────────────────────────────────────────

/// A validated service identifier in `1..=32`.
///
/// Construct with [`ServiceId::new`] or `ServiceId::try_from(u8)`.  Once
/// constructed the id is always in range, so mask and index helpers never
/// need to re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ServiceId(u8);

impl ServiceId {
    /// Service 1, the lowest id.
    pub const MIN: ServiceId = ServiceId(MIN_SERVICE_ID);

    /// Returns `Some(id)` if `raw` is in `1..=32`.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw >= MIN_SERVICE_ID && raw <= MAX_SERVICE_ID {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// The raw integer value.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Zero-based index into the per-service limit/count arrays.
    pub const fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// The single-bit mask for this id.
    pub const fn mask(self) -> ServiceMask {
        ServiceMask(1u32 << (self.0 - 1))
    }

    /// Iterates every valid id in ascending order.
    pub fn all() -> impl Iterator<Item = ServiceId> {
        (MIN_SERVICE_ID..=MAX_SERVICE_ID).map(ServiceId)
    }
}

impl TryFrom<u8> for ServiceId {
    type Error = ServiceIdOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ServiceId::new(value).ok_or(ServiceIdOutOfRange(value))
    }
}

impl From<ServiceId> for u8 {
    fn from(id: ServiceId) -> Self {
        id.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps a raw service id to its bitmask, returning 0 for ids outside `1..=32`.
///
/// This is the wire-facing helper: callers that hold an unvalidated byte
/// can test membership with it and get "not a member" for garbage input.
pub const fn service_mask(raw: u8) -> u32 {
    match ServiceId::new(raw) {
        Some(id) => id.mask().bits(),
        None => 0,
    }
}

// ── ServiceMask ───────────────────────────────────────────────────────────────

/// A set of [`ServiceId`]s stored as a 32-bit mask (bit `id - 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct ServiceMask(u32);

impl ServiceMask {
    /// The empty set.
    pub const EMPTY: ServiceMask = ServiceMask(0);

    /// Every service id.
    pub const ALL: ServiceMask = ServiceMask(u32::MAX);

    /// Wraps a raw mask as received from the mesh stack.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw mask value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, id: ServiceId) -> bool {
        self.0 & id.mask().0 != 0
    }

    pub fn insert(&mut self, id: ServiceId) {
        self.0 |= id.mask().0;
    }

    pub fn remove(&mut self, id: ServiceId) {
        self.0 &= !id.mask().0;
    }

    pub const fn union(self, other: ServiceMask) -> ServiceMask {
        ServiceMask(self.0 | other.0)
    }

    pub const fn intersection(self, other: ServiceMask) -> ServiceMask {
        ServiceMask(self.0 & other.0)
    }

    /// Members of `self` that are not in `other`.
    pub const fn difference(self, other: ServiceMask) -> ServiceMask {
        ServiceMask(self.0 & !other.0)
    }

    /// Number of ids in the set.
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates the member ids in ascending order.
    pub fn iter(self) -> impl Iterator<Item = ServiceId> {
        ServiceId::all().filter(move |id| self.contains(*id))
    }
}

impl From<ServiceId> for ServiceMask {
    fn from(id: ServiceId) -> Self {
        id.mask()
    }
}

impl FromIterator<ServiceId> for ServiceMask {
    fn from_iter<I: IntoIterator<Item = ServiceId>>(iter: I) -> Self {
        let mut mask = ServiceMask::EMPTY;
        for id in iter {
            mask.insert(id);
        }
        mask
    }
}

impl BitOr for ServiceMask {
    type Output = ServiceMask;

    fn bitor(self, rhs: ServiceMask) -> ServiceMask {
        self.union(rhs)
    }
}

impl BitOrAssign for ServiceMask {
    fn bitor_assign(&mut self, rhs: ServiceMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ServiceMask {
    type Output = ServiceMask;

    fn bitand(self, rhs: ServiceMask) -> ServiceMask {
        self.intersection(rhs)
    }
}

impl fmt::Display for ServiceMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

// ── ServiceRole ───────────────────────────────────────────────────────────────

/// Which side of a binding a directory tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceRole {
    /// Services this node can receive on.  Fan limit caps incoming bindings.
    Register,
    /// Services this node transmits on.  Fan limit is the number of
    /// bindings to establish before the request is satisfied.
    Request,
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceRole::Register => f.write_str("register"),
            ServiceRole::Request => f.write_str("request"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
