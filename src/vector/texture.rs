//! Texture table indexed by 1-based [`ImageId`]s.

use crate::error::{CrateResult, RenderError};
use crate::vector::device::TextureDesc;
use crate::vector::growable::{grown_capacity, TEXTURE_FLOOR};
use crate::vector::types::ImageId;
use crate::vector::uniforms::TextureInfo;

#[derive(Debug)]
pub struct TextureEntry<T> {
    pub resource: T,
    pub desc: TextureDesc,
}

/// An empty slot handed out by [`TextureTable::vacant_slot`]
#[derive(Debug)]
pub struct VacantSlot(ImageId);

/// Resolves image ids during recording
pub trait TextureLookup {
    fn info(&self, id: ImageId) -> Option<TextureInfo>;
}

/// Slots hold live textures or nothing; empty slots are reused first.
#[derive(Debug)]
pub struct TextureTable<T> {
    slots: Vec<Option<TextureEntry<T>>>,
}

impl<T> TextureTable<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Store a texture in the first empty slot, appending if there is none
    pub fn insert(&mut self, entry: TextureEntry<T>) -> CrateResult<ImageId> {
        let slot = self.vacant_slot()?;
        Ok(self.occupy(slot, entry))
    }

    /// Find the first empty slot, appending one if there is none.
    ///
    /// The slot stays empty, and thus reusable, until [`TextureTable::occupy`].
    pub fn vacant_slot(&mut self) -> CrateResult<VacantSlot> {
        let overflow = RenderError::HostAllocation {
            what: "texture slots",
            requested: 1,
        };
        if let Some(slot) = self.slots.iter().position(Option::is_none) {
            let id = ImageId::from_slot(slot).ok_or(overflow)?;
            return Ok(VacantSlot(id));
        }

        let slot = self.slots.len();
        let id = ImageId::from_slot(slot).ok_or(overflow)?;
        if slot == self.slots.capacity() {
            let target = grown_capacity(slot, slot + 1, TEXTURE_FLOOR);
            self.slots
                .try_reserve_exact(target - slot)
                .map_err(|_| RenderError::HostAllocation {
                    what: "texture slots",
                    requested: 1,
                })?;
        }
        self.slots.push(None);
        Ok(VacantSlot(id))
    }

    pub fn occupy(&mut self, slot: VacantSlot, entry: TextureEntry<T>) -> ImageId {
        let VacantSlot(id) = slot;
        self.slots[id.slot()] = Some(entry);
        id
    }

    pub fn get(&self, id: ImageId) -> Option<&TextureEntry<T>> {
        self.slots.get(id.slot()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ImageId) -> Option<&mut TextureEntry<T>> {
        self.slots.get_mut(id.slot()).and_then(Option::as_mut)
    }

    /// Take the texture out, leaving its slot free for reuse
    pub fn remove(&mut self, id: ImageId) -> Option<TextureEntry<T>> {
        self.slots.get_mut(id.slot()).and_then(Option::take)
    }

    pub fn size(&self, id: ImageId) -> Option<(u32, u32)> {
        self.get(id).map(|entry| (entry.desc.width, entry.desc.height))
    }

    /// Number of live textures
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every texture, handing each resource to `destroy`
    pub fn drain(&mut self, mut destroy: impl FnMut(T)) {
        for entry in self.slots.drain(..).flatten() {
            destroy(entry.resource);
        }
    }
}

impl<T> Default for TextureTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TextureLookup for TextureTable<T> {
    fn info(&self, id: ImageId) -> Option<TextureInfo> {
        self.get(id).map(|entry| TextureInfo {
            kind: entry.desc.kind,
            flags: entry.desc.flags,
            width: entry.desc.width,
            height: entry.desc.height,
        })
    }
}
