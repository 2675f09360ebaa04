//! # Child instance routing
//!
//! A parent protocol runs many child instances of the same kind, e.g. one common coin per round
//! or one binary agreement per proposer. Their messages travel inside the parent's messages in an
//! envelope naming the subsystem and the child's index, so the receiving parent can hand them to
//! the matching child. Children are created lazily on first reference, but never beyond a limit
//! chosen by the parent: an index past the limit is rejected instead of growing the arena.

use std::fmt;

use thiserror::Error;

use crate::wire::{self, DecodeError};

/// An error looking up a child instance.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RouteError {
    /// The index is beyond what the parent currently accepts.
    #[error("Index {index} is beyond the accepted limit {limit}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The largest index the parent accepts at the moment.
        limit: usize,
    },
}

/// An arena of lazily created child instances, addressed by index.
#[derive(Debug)]
pub struct Router<D> {
    instances: Vec<Option<D>>,
}

impl<D> Default for Router<D> {
    fn default() -> Self {
        Router {
            instances: Vec::new(),
        }
    }
}

impl<D> Router<D> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Router::default()
    }

    /// Returns the child at `index`, creating it with `create` if it doesn't exist yet.
    ///
    /// Fails with `RouteError::IndexOutOfRange` if `index > limit`, or with the error returned by
    /// `create`. In both cases the arena is unchanged.
    pub fn instance<E, F>(&mut self, index: usize, limit: usize, create: F) -> Result<&mut D, E>
    where
        E: From<RouteError>,
        F: FnOnce() -> Result<D, E>,
    {
        if index > limit {
            return Err(RouteError::IndexOutOfRange { index, limit }.into());
        }
        if index >= self.instances.len() {
            self.instances.resize_with(index + 1, || None);
        }
        let slot = &mut self.instances[index];
        let instance = match slot.take() {
            Some(instance) => instance,
            None => create()?,
        };
        Ok(slot.get_or_insert(instance))
    }

    /// Returns the child at `index`, if it exists.
    pub fn get(&self, index: usize) -> Option<&D> {
        self.instances.get(index).and_then(Option::as_ref)
    }

    /// Drops all children.
    pub fn clear(&mut self) {
        self.instances.clear();
    }
}

/// The envelope header of a wrapped child message: subsystem tag and child index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Envelope {
    /// Which kind of child the message is for.
    pub subsystem: u8,
    /// The child's index within its subsystem.
    pub index: u16,
}

impl Envelope {
    /// Creates a new envelope header.
    pub fn new(subsystem: u8, index: u16) -> Self {
        Envelope { subsystem, index }
    }

    /// Appends the header, preceded by the parent's type tag.
    pub(crate) fn encode(self, tag: u8, buf: &mut Vec<u8>) {
        wire::put_u8(buf, tag);
        wire::put_u8(buf, self.subsystem);
        wire::put_u16(buf, self.index);
    }

    /// Reads the header that follows an already consumed type tag.
    pub(crate) fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let subsystem = wire::get_u8(data)?;
        let index = wire::get_u16(data)?;
        Ok(Envelope { subsystem, index })
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subsystem, self.index)
    }
}
