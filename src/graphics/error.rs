use thiserror::Error;

/// Failures while setting up Vulkan resources
#[derive(Error, Debug)]
pub enum GraphicsError {
    #[error("No suitable Vulkan device found among {0} devices")]
    NoSuitableDevice(usize),

    #[error("Failed to find a graphics queue family")]
    NoGraphicsQueue,

    #[error("No memory type matches filter {type_filter:#x} with {properties}")]
    NoMemoryType {
        type_filter: u32,
        properties: String,
    },

    #[error("Descriptor pool exhausted after {0} matrix blocks")]
    DescriptorPoolExhausted(usize),

    #[error("Failed to load Vulkan: {0}")]
    Loading(String),
}
