//! Vulkan instance and device setup for offscreen rendering
//!
//! Windowing and presentation are left to the embedding application; this
//! context only needs a queue that supports graphics.

use crate::error::{CrateResult, RenderError};
use crate::graphics::error::GraphicsError;
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};

/// Index of a memory type allowed by `type_filter` that has all of `properties`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> CrateResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or_else(|| {
            GraphicsError::NoMemoryType {
                type_filter,
                properties: format!("{properties:?}"),
            }
            .into()
        })
}

/// Rank used to prefer discrete GPUs, then integrated, then virtual, then CPU
fn device_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 3,
        _ => 4,
    }
}

/// Instance, device and graphics queue owned together
pub struct VulkanContext {
    _entry: Entry,
    instance: Instance,
    physical_device: vk::PhysicalDevice,
    device: Device,
    queue_family_index: u32,
    queue: vk::Queue,
    command_pool: vk::CommandPool,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    limits: vk::PhysicalDeviceLimits,
    device_name: String,
}

impl VulkanContext {
    /// Create an instance and a device with one graphics queue
    pub fn new(app_name: &str) -> CrateResult<Self> {
        unsafe {
            let entry = Entry::load().map_err(|e| GraphicsError::Loading(e.to_string()))?;

            let app_name =
                CString::new(app_name).map_err(|e| RenderError::InvalidArgument(e.to_string()))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 0, 1, 0))
                .engine_name(c"canvas-vk")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            #[allow(unused_mut)] // Only modified on macOS
            let mut extension_names = vec![];
            #[allow(unused_mut)] // Only modified on macOS
            let mut create_flags = vk::InstanceCreateFlags::empty();

            #[cfg(target_os = "macos")]
            {
                let available = entry.enumerate_instance_extension_properties(None)?;
                let has_portability = available.iter().any(|ext| {
                    CStr::from_ptr(ext.extension_name.as_ptr()) == ash::khr::portability_enumeration::NAME
                });
                if has_portability {
                    extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());
                    create_flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
                }
            }

            let instance = entry.create_instance(
                &vk::InstanceCreateInfo::default()
                    .application_info(&app_info)
                    .enabled_extension_names(&extension_names)
                    .flags(create_flags),
                None,
            )?;

            // Pick the best ranked device that has a graphics queue
            let physical_devices = instance.enumerate_physical_devices()?;
            let device_count = physical_devices.len();
            let (physical_device, queue_family_index) = physical_devices
                .into_iter()
                .filter_map(|pd| {
                    instance
                        .get_physical_device_queue_family_properties(pd)
                        .iter()
                        .position(|q| q.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                        .map(|q| (pd, q as u32))
                })
                .min_by_key(|(pd, _)| {
                    device_rank(instance.get_physical_device_properties(*pd).device_type)
                })
                .ok_or(GraphicsError::NoSuitableDevice(device_count))?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = CStr::from_ptr(properties.device_name.as_ptr())
                .to_string_lossy()
                .to_string();
            let memory_properties = instance.get_physical_device_memory_properties(physical_device);
            log::info!("using Vulkan device {device_name} (queue family {queue_family_index})");

            let queue_priorities = [1.0];
            let queue_info = vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family_index)
                .queue_priorities(&queue_priorities);

            #[allow(unused_mut)] // Only modified on macOS
            let mut device_extension_names = vec![];
            #[cfg(target_os = "macos")]
            {
                let available = instance.enumerate_device_extension_properties(physical_device)?;
                if available.iter().any(|ext| {
                    CStr::from_ptr(ext.extension_name.as_ptr()) == ash::khr::portability_subset::NAME
                }) {
                    device_extension_names.push(ash::khr::portability_subset::NAME.as_ptr());
                }
            }

            let device = instance.create_device(
                physical_device,
                &vk::DeviceCreateInfo::default()
                    .queue_create_infos(std::slice::from_ref(&queue_info))
                    .enabled_extension_names(&device_extension_names),
                None,
            )?;
            let queue = device.get_device_queue(queue_family_index, 0);

            let command_pool = device.create_command_pool(
                &vk::CommandPoolCreateInfo::default()
                    .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
                    .queue_family_index(queue_family_index),
                None,
            )?;

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                device,
                queue_family_index,
                queue,
                command_pool,
                memory_properties,
                limits: properties.limits,
                device_name,
            })
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    pub fn min_uniform_alignment(&self) -> vk::DeviceSize {
        self.limits.min_uniform_buffer_offset_alignment
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// UUID identifying the physical device across APIs
    pub fn device_uuid(&self) -> [u8; vk::UUID_SIZE] {
        device_uuid(&self.instance, self.physical_device)
    }

    /// Allocate a primary command buffer from the context's pool
    pub fn allocate_command_buffer(&self) -> CrateResult<vk::CommandBuffer> {
        let buffers = unsafe {
            self.device.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::default()
                    .command_pool(self.command_pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1),
            )?
        };
        buffers
            .into_iter()
            .next()
            .ok_or_else(|| RenderError::Other("no command buffer allocated".to_string()))
    }

    /// Submit one recorded command buffer and block until the queue is idle
    pub fn submit_and_wait(&self, command_buffer: vk::CommandBuffer) -> CrateResult<()> {
        unsafe {
            self.device.queue_submit(
                self.queue,
                &[vk::SubmitInfo::default().command_buffers(&[command_buffer])],
                vk::Fence::null(),
            )?;
            self.device.queue_wait_idle(self.queue)?;
        }
        Ok(())
    }
}

/// UUID of `physical_device` from `VkPhysicalDeviceIDProperties`
pub fn device_uuid(instance: &Instance, physical_device: vk::PhysicalDevice) -> [u8; vk::UUID_SIZE] {
    let mut id_properties = vk::PhysicalDeviceIDProperties::default();
    let mut properties = vk::PhysicalDeviceProperties2::default().push_next(&mut id_properties);
    unsafe {
        instance.get_physical_device_properties2(physical_device, &mut properties);
    }
    id_properties.device_uuid
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            // Nothing useful can be done with a failure during teardown
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
