use super::block::{Block, BlockId, BlockKind};

/// Ordered, mutable surface the transcript engine commits blocks to
///
/// Lookup by id descends into group and summary children, since live status
/// updates keep addressing children after their group closed or was merged
/// into a turn summary. Ordering operations (`insert_before`, `remove`,
/// `index_of`) work on top-level blocks only.
pub trait Canvas {
    fn append(&mut self, block: Block);

    /// Insert before the given top-level block; `None` (or an unknown
    /// anchor) appends at the end
    fn insert_before(&mut self, anchor: Option<BlockId>, block: Block);

    fn remove(&mut self, id: BlockId) -> Option<Block>;

    fn clear(&mut self);

    fn index_of(&self, id: BlockId) -> Option<usize>;

    fn get(&self, id: BlockId) -> Option<&Block>;

    fn get_mut(&mut self, id: BlockId) -> Option<&mut Block>;

    fn blocks(&self) -> &[Block];

    fn len(&self) -> usize {
        self.blocks().len()
    }

    fn is_empty(&self) -> bool {
        self.blocks().is_empty()
    }
}

/// Scroll state of the surface a canvas is attached to
///
/// Offsets and extents are measured in display lines. Only the
/// virtualization window reads or writes these.
pub trait Viewport {
    fn scroll_offset(&self) -> f32;

    fn content_extent(&self) -> f32;

    fn set_scroll_offset(&mut self, offset: f32);
}

fn find_in(blocks: &[Block], id: BlockId) -> Option<&Block> {
    for block in blocks {
        if block.id == id {
            return Some(block);
        }
        let children = match &block.kind {
            BlockKind::Group(group) => &group.children,
            BlockKind::Summary(summary) => &summary.children,
            _ => continue,
        };
        if let Some(found) = find_in(children, id) {
            return Some(found);
        }
    }
    None
}

fn find_in_mut(blocks: &mut [Block], id: BlockId) -> Option<&mut Block> {
    for block in blocks.iter_mut() {
        if block.id == id {
            return Some(block);
        }
        let children = match &mut block.kind {
            BlockKind::Group(group) => &mut group.children,
            BlockKind::Summary(summary) => &mut summary.children,
            _ => continue,
        };
        if let Some(found) = find_in_mut(children, id) {
            return Some(found);
        }
    }
    None
}

/// The canonical `Vec`-backed canvas
///
/// Doubles as the staging surface for cancellable rebuilds and older-batch
/// builds; content extent follows the per-block line-height model so scroll
/// arithmetic is exercised honestly in tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockList {
    blocks: Vec<Block>,
    scroll_offset: f32,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the list, yielding blocks in order (commit step)
    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}

impl Canvas for BlockList {
    fn append(&mut self, block: Block) {
        self.blocks.push(block);
    }

    fn insert_before(&mut self, anchor: Option<BlockId>, block: Block) {
        match anchor.and_then(|id| self.index_of(id)) {
            Some(index) => self.blocks.insert(index, block),
            None => self.blocks.push(block),
        }
    }

    fn remove(&mut self, id: BlockId) -> Option<Block> {
        let index = self.index_of(id)?;
        Some(self.blocks.remove(index))
    }

    fn clear(&mut self) {
        self.blocks.clear();
        self.scroll_offset = 0.0;
    }

    fn index_of(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    fn get(&self, id: BlockId) -> Option<&Block> {
        find_in(&self.blocks, id)
    }

    fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        find_in_mut(&mut self.blocks, id)
    }

    fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}

impl Viewport for BlockList {
    fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    fn content_extent(&self) -> f32 {
        self.blocks.iter().map(|b| b.line_height() as f32).sum()
    }

    fn set_scroll_offset(&mut self, offset: f32) {
        self.scroll_offset = offset.max(0.0);
    }
}
