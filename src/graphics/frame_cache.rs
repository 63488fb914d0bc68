//! Per-swapchain-image pools of matrix uniform buffers and descriptor sets
//!
//! Every frame that changes the model/view/projection matrices needs a fresh
//! uniform buffer, because the previous one may still be read by commands in
//! flight. Each swapchain image owns a pool of buffer/descriptor-set pairs:
//! - all pairs ever allocated for that image, and
//! - the subset still free in the current frame.
//!
//! At the start of a frame the free subset is reset to all pairs, which is
//! safe because the image's previous frame has finished by then. Pools only
//! grow. All images draw their descriptor sets from one descriptor pool, so
//! the block limit counts the pairs of every image together.

use crate::error::CrateResult;
use crate::graphics::error::GraphicsError;
use glam::Mat4;
use shared::MatrixBlock;
use std::collections::VecDeque;

/// Creates and fills the GPU resources behind the cache
pub trait MatrixResourceAllocator {
    type Buffer;
    type Set: Copy;

    /// A new uniform buffer sized for one [`MatrixBlock`] and a descriptor
    /// set pointing at it
    fn allocate(&mut self) -> CrateResult<(Self::Buffer, Self::Set)>;

    fn write(&mut self, buffer: &Self::Buffer, block: &MatrixBlock) -> CrateResult<()>;

    fn release(&mut self, buffer: Self::Buffer, set: Self::Set);
}

/// Pool of one swapchain image
#[derive(Debug)]
pub struct FrameCache<B, S> {
    all: Vec<(B, S)>,
    free: VecDeque<usize>,
}

impl<B, S: Copy> FrameCache<B, S> {
    fn new() -> Self {
        Self {
            all: Vec::new(),
            free: VecDeque::new(),
        }
    }

    fn reset_free(&mut self) {
        self.free.clear();
        self.free.extend(0..self.all.len());
    }

    pub fn allocated(&self) -> usize {
        self.all.len()
    }

    pub fn free(&self) -> usize {
        self.free.len()
    }
}

/// Current matrices plus the per-image pools they are uploaded through
#[derive(Debug)]
pub struct MatrixBlockCache<B, S> {
    block: MatrixBlock,
    dirty: bool,
    frame_caches: Vec<FrameCache<B, S>>,
    frame_index: usize,
    max_blocks: usize,
}

impl<B, S: Copy> MatrixBlockCache<B, S> {
    /// `max_blocks` bounds the pairs allocated across all images
    pub fn new(max_blocks: usize) -> Self {
        Self {
            block: MatrixBlock::default(),
            dirty: true,
            frame_caches: Vec::new(),
            frame_index: 0,
            max_blocks,
        }
    }

    /// Select the pool of `image_index` and mark all its pairs free.
    ///
    /// The ring is resized to `image_count` first; pools of images that no
    /// longer exist are handed back through `release`.
    pub fn begin_frame(
        &mut self,
        image_index: usize,
        image_count: usize,
        mut release: impl FnMut(B, S),
    ) {
        let image_count = image_count.max(image_index + 1);
        while self.frame_caches.len() > image_count {
            if let Some(cache) = self.frame_caches.pop() {
                for (buffer, set) in cache.all {
                    release(buffer, set);
                }
            }
        }
        self.frame_caches.resize_with(image_count, FrameCache::new);

        self.frame_index = image_index;
        self.frame_caches[image_index].reset_free();
        // A new frame must bind its own copy of the matrices
        self.dirty = true;
    }

    pub fn set_model_matrix(&mut self, matrix: Mat4) {
        self.block.model = matrix;
        self.dirty = true;
    }

    pub fn set_view_matrix(&mut self, matrix: Mat4) {
        self.block.view = matrix;
        self.dirty = true;
    }

    pub fn set_projection_matrix(&mut self, matrix: Mat4) {
        self.block.projection = matrix;
        self.dirty = true;
    }

    pub fn block(&self) -> &MatrixBlock {
        &self.block
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn current_frame(&self) -> Option<&FrameCache<B, S>> {
        self.frame_caches.get(self.frame_index)
    }

    /// Pairs allocated over every image
    pub fn total_allocated(&self) -> usize {
        self.frame_caches.iter().map(FrameCache::allocated).sum()
    }

    /// Upload the matrices when they changed.
    ///
    /// Returns the descriptor set to bind, or `None` when the previously
    /// bound set is still current.
    pub fn update<A>(&mut self, allocator: &mut A) -> CrateResult<Option<S>>
    where
        A: MatrixResourceAllocator<Buffer = B, Set = S>,
    {
        if !self.dirty {
            return Ok(None);
        }
        if self.frame_caches.is_empty() {
            self.frame_caches.push(FrameCache::new());
            self.frame_index = 0;
        }

        let total = self.total_allocated();
        let cache = &mut self.frame_caches[self.frame_index];
        if cache.free.is_empty() {
            if total >= self.max_blocks {
                return Err(GraphicsError::DescriptorPoolExhausted(total).into());
            }
            let pair = allocator.allocate()?;
            cache.all.push(pair);
            cache.free.push_back(cache.all.len() - 1);
            log::debug!(
                "frame slot {} grew to {} matrix blocks",
                self.frame_index,
                cache.all.len()
            );
        }

        let index = match cache.free.pop_front() {
            Some(index) => index,
            None => return Ok(None),
        };
        let (buffer, set) = &cache.all[index];

        self.block.update_mvp();
        allocator.write(buffer, &self.block)?;
        self.dirty = false;
        Ok(Some(*set))
    }

    /// Hand every pair of every image back to `release`
    pub fn drain(&mut self, mut release: impl FnMut(B, S)) {
        for cache in self.frame_caches.drain(..) {
            for (buffer, set) in cache.all {
                release(buffer, set);
            }
        }
    }
}
