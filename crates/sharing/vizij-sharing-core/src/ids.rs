//! Identifiers shared between the scheduler and its host.
//!
//! Host-side entities (actors, components, skeletons, clips) are opaque keys chosen by
//! the host. `StateId` is a dense index into a skeleton's state table and `ActorHandle`
//! is the packed `(skeleton, actor)` reference handed back on registration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical animation state, a dense index into the owning skeleton's catalog.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct StateId(pub u8);

impl StateId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host identity of a registered actor.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u64);

/// Host identity of a skinned mesh component (follower, slot or helper).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub u64);

/// Name of a shared rig.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkeletonId(pub String);

impl SkeletonId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SkeletonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to an animation clip resolved through the host's asset resolver.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Largest actor index representable in a handle.
pub const MAX_ACTOR_INDEX: u32 = 0x00FF_FFFF;

/// Packed actor reference: scheduler (skeleton) index in the high byte, actor index
/// in the low 24 bits.
///
/// A handle stays valid until its actor is unregistered or renumbered by the removal
/// of another actor; renumbering is announced through the actor's handle callback.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorHandle(pub u32);

impl ActorHandle {
    #[inline]
    pub fn new(skeleton_index: u8, actor_index: u32) -> Self {
        debug_assert!(
            actor_index <= MAX_ACTOR_INDEX,
            "actor index {actor_index} overflows the handle"
        );
        Self(((skeleton_index as u32) << 24) | (actor_index & MAX_ACTOR_INDEX))
    }

    #[inline]
    pub fn skeleton_index(self) -> u8 {
        ((self.0 & 0xFF00_0000) >> 24) as u8
    }

    #[inline]
    pub fn actor_index(self) -> u32 {
        self.0 & MAX_ACTOR_INDEX
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl From<ActorHandle> for u32 {
    fn from(handle: ActorHandle) -> Self {
        handle.0
    }
}

impl fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.skeleton_index(), self.actor_index())
    }
}
