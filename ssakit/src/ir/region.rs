use crate::ir::Block;
use crate::ir::Operation;
use crate::shared::weak;
use crate::shared::Shared;
use crate::shared::SharedExt;
use crate::shared::WeakShared;
use std::sync::Arc;

/// An ordered list of blocks owned by an operation.
///
/// Whether a region must hold a single block or may hold a control-flow
/// graph is declared by the owning operation's schema.
pub struct Region {
    blocks: Vec<Shared<Block>>,
    parent: Option<WeakShared<Operation>>,
}

impl Region {
    pub fn new() -> Self {
        Self {
            blocks: vec![],
            parent: None,
        }
    }
    pub fn blocks(&self) -> Vec<Shared<Block>> {
        self.blocks.clone()
    }
    pub fn block(&self, index: usize) -> Option<Shared<Block>> {
        self.blocks.get(index).cloned()
    }
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
    /// The entry block, `None` for an empty region.
    pub fn entry(&self) -> Option<Shared<Block>> {
        self.blocks.first().cloned()
    }
    pub fn parent(&self) -> Option<Shared<Operation>> {
        self.parent.as_ref().and_then(|parent| parent.upgrade())
    }
    pub fn set_parent(&mut self, parent: Option<WeakShared<Operation>>) {
        self.parent = parent;
    }
    /// The position of `block` in this region, by identity.
    pub fn index_of(&self, block: &Shared<Block>) -> Option<usize> {
        self.blocks
            .iter()
            .position(|current| Arc::ptr_eq(current, block))
    }
    /// All operations in all blocks, in block order.
    pub fn ops(&self) -> Vec<Shared<Operation>> {
        let mut out = vec![];
        for block in self.blocks.iter() {
            out.extend(block.rd().ops());
        }
        out
    }
    pub(crate) fn push_block_raw(&mut self, block: Shared<Block>) {
        self.blocks.push(block);
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutation helpers on a shared region that keep parent links consistent.
pub trait RegionExt {
    /// Append a block, wiring its parent link.
    fn push_block(&self, block: Shared<Block>);
    /// Append a fresh empty block and return it.
    fn add_block(&self) -> Shared<Block>;
}

impl RegionExt for Shared<Region> {
    fn push_block(&self, block: Shared<Block>) {
        block.wr().set_parent(Some(weak(self)));
        self.wr().push_block_raw(block);
    }
    fn add_block(&self) -> Shared<Block> {
        let block = Shared::new(Block::default().into());
        self.push_block(block.clone());
        block
    }
}
