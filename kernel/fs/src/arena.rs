// kernel/fs/src/arena.rs
// Generational Node Ring
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use crate::config::NODE_RING_CAPACITY;
use crate::error::{FsError, Result};
use crate::node::{Node, NodeHandle};

#[derive(Copy, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

impl Slot {
    const EMPTY: Slot = Slot {
        generation: 0,
        node: None,
    };
}

/// Fixed ring of lookup results. Allocation always succeeds by recycling
/// the oldest slot; the bumped generation makes old handles detectably
/// stale.
pub struct NodeArena {
    slots: [Slot; NODE_RING_CAPACITY],
    cursor: usize,
}

impl NodeArena {
    pub const fn new() -> Self {
        Self {
            slots: [Slot::EMPTY; NODE_RING_CAPACITY],
            cursor: 0,
        }
    }

    pub fn alloc(&mut self, node: Node) -> NodeHandle {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % NODE_RING_CAPACITY;

        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1).max(1);
        slot.node = Some(node);
        NodeHandle::Slot {
            index: index as u8,
            generation: slot.generation,
        }
    }

    fn slot(&self, index: u8, generation: u32) -> Result<&Slot> {
        let slot = self
            .slots
            .get(index as usize)
            .ok_or(FsError::InvalidArgument)?;
        if slot.node.is_none() || slot.generation != generation {
            return Err(FsError::StaleHandle);
        }
        Ok(slot)
    }

    pub fn get(&self, index: u8, generation: u32) -> Result<&Node> {
        self.slot(index, generation)?
            .node
            .as_ref()
            .ok_or(FsError::StaleHandle)
    }

    pub fn get_mut(&mut self, index: u8, generation: u32) -> Result<&mut Node> {
        self.slot(index, generation)?;
        self.slots[index as usize]
            .node
            .as_mut()
            .ok_or(FsError::StaleHandle)
    }

    /// Apply `f` to every live node.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut Node)) {
        for node in self.slots.iter_mut().filter_map(|s| s.node.as_mut()) {
            f(node);
        }
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}
