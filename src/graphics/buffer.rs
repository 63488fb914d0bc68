//! Host-visible buffers that are rewritten every frame

use crate::error::CrateResult;
use crate::graphics::device::find_memory_type;
use ash::{vk, Device};

/// Smallest buffer ever created; Vulkan rejects zero-sized buffers
const MIN_BUFFER_SIZE: vk::DeviceSize = 256;

/// A buffer in host-visible, host-coherent memory.
///
/// The buffer does not keep the device alive; call [`HostBuffer::destroy`]
/// before the device goes away.
#[derive(Debug)]
pub struct HostBuffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
}

impl HostBuffer {
    pub fn new(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        usage: vk::BufferUsageFlags,
        size: vk::DeviceSize,
    ) -> CrateResult<Self> {
        let size = size.max(MIN_BUFFER_SIZE);
        unsafe {
            let buffer = device.create_buffer(
                &vk::BufferCreateInfo::default()
                    .size(size)
                    .usage(usage)
                    .sharing_mode(vk::SharingMode::EXCLUSIVE),
                None,
            )?;

            let requirements = device.get_buffer_memory_requirements(buffer);
            let memory_type_index = match find_memory_type(
                memory_properties,
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ) {
                Ok(index) => index,
                Err(err) => {
                    device.destroy_buffer(buffer, None);
                    return Err(err);
                }
            };

            let memory = match device.allocate_memory(
                &vk::MemoryAllocateInfo::default()
                    .allocation_size(requirements.size)
                    .memory_type_index(memory_type_index),
                None,
            ) {
                Ok(memory) => memory,
                Err(err) => {
                    device.destroy_buffer(buffer, None);
                    return Err(err.into());
                }
            };
            device.bind_buffer_memory(buffer, memory, 0)?;

            Ok(Self {
                buffer,
                memory,
                size,
                usage,
            })
        }
    }

    /// Create a buffer holding `data`
    pub fn with_data(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        usage: vk::BufferUsageFlags,
        data: &[u8],
    ) -> CrateResult<Self> {
        let buffer = Self::new(device, memory_properties, usage, data.len() as vk::DeviceSize)?;
        buffer.write(device, data)?;
        Ok(buffer)
    }

    /// Copy `data` to the start of the buffer, which must be large enough
    pub fn write(&self, device: &Device, data: &[u8]) -> CrateResult<()> {
        debug_assert!(data.len() as vk::DeviceSize <= self.size);
        if data.is_empty() {
            return Ok(());
        }
        unsafe {
            let ptr = device.map_memory(
                self.memory,
                0,
                data.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr as *mut u8, data.len());
            device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Write `data`, recreating the buffer first when it is too small.
    ///
    /// Returns `true` when the buffer handle changed.
    pub fn upload(
        &mut self,
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        data: &[u8],
    ) -> CrateResult<bool> {
        let required = data.len() as vk::DeviceSize;
        let recreated = required > self.size;
        if recreated {
            let replacement = Self::new(device, memory_properties, self.usage, required)?;
            self.destroy(device);
            *self = replacement;
        }
        self.write(device, data)?;
        Ok(recreated)
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    pub fn destroy(&mut self, device: &Device) {
        unsafe {
            if self.buffer != vk::Buffer::null() {
                device.destroy_buffer(self.buffer, None);
            }
            if self.memory != vk::DeviceMemory::null() {
                device.free_memory(self.memory, None);
            }
        }
        self.buffer = vk::Buffer::null();
        self.memory = vk::DeviceMemory::null();
        self.size = 0;
    }
}
