//! CUDA driver capability
//!
//! The driver API is injected as a [`CudaDriverApi`] implementation instead of
//! living in a process-wide function table. [`CudaInterop`] owns it and tracks
//! whether `cuInit` succeeded, so callers can ask for it once and share it.

use thiserror::Error;

/// Size of a device UUID, same as `VK_UUID_SIZE`
pub const UUID_SIZE: usize = 16;

pub type DeviceUuid = [u8; UUID_SIZE];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CudaError {
    #[error("{call} failed with CUresult {code}")]
    Driver { call: &'static str, code: i32 },

    #[error("CUDA driver API used before initialization")]
    NotInitialized,
}

/// The subset of the CUDA driver API used for device matching
pub trait CudaDriverApi {
    /// `CUdevice`
    type Device: Copy + std::fmt::Debug;

    /// `cuInit(0)`
    fn init(&mut self) -> Result<(), CudaError>;

    /// `cuDeviceGetCount`
    fn device_count(&self) -> Result<i32, CudaError>;

    /// `cuDeviceGet`
    fn device(&self, ordinal: i32) -> Result<Self::Device, CudaError>;

    /// `cuDeviceGetUuid`
    fn device_uuid(&self, device: Self::Device) -> Result<DeviceUuid, CudaError>;
}

#[derive(Debug)]
pub struct CudaInterop<A: CudaDriverApi> {
    api: A,
    initialized: bool,
}

impl<A: CudaDriverApi> CudaInterop<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            initialized: false,
        }
    }

    /// Initialise the driver. Calling it again after success is a no-op.
    pub fn initialize(&mut self) -> Result<(), CudaError> {
        if self.initialized {
            return Ok(());
        }
        self.api.init()?;
        self.initialized = true;
        log::debug!("CUDA driver API initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn shutdown(&mut self) {
        if self.initialized {
            log::debug!("CUDA driver API released");
        }
        self.initialized = false;
    }

    pub fn api(&self) -> Result<&A, CudaError> {
        if self.initialized {
            Ok(&self.api)
        } else {
            Err(CudaError::NotInitialized)
        }
    }

    /// The CUDA device that is the same physical GPU as the Vulkan device
    /// with `vulkan_uuid`, if any.
    pub fn matching_device(&self, vulkan_uuid: &DeviceUuid) -> Result<Option<A::Device>, CudaError> {
        let api = self.api()?;
        let count = api.device_count()?;
        for ordinal in 0..count {
            let device = api.device(ordinal)?;
            if api.device_uuid(device)? == *vulkan_uuid {
                log::debug!("CUDA device {ordinal} matches the Vulkan device");
                return Ok(Some(device));
            }
        }
        log::warn!("none of {count} CUDA devices matches the Vulkan device");
        Ok(None)
    }
}

impl<A: CudaDriverApi> Drop for CudaInterop<A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDriver {
        uuids: Vec<DeviceUuid>,
        init_result: Result<(), CudaError>,
        init_calls: usize,
    }

    impl FakeDriver {
        fn with_uuids(uuids: Vec<DeviceUuid>) -> Self {
            Self {
                uuids,
                init_result: Ok(()),
                init_calls: 0,
            }
        }
    }

    impl CudaDriverApi for FakeDriver {
        type Device = i32;

        fn init(&mut self) -> Result<(), CudaError> {
            self.init_calls += 1;
            self.init_result.clone()
        }

        fn device_count(&self) -> Result<i32, CudaError> {
            Ok(self.uuids.len() as i32)
        }

        fn device(&self, ordinal: i32) -> Result<i32, CudaError> {
            Ok(ordinal)
        }

        fn device_uuid(&self, device: i32) -> Result<DeviceUuid, CudaError> {
            Ok(self.uuids[device as usize])
        }
    }

    #[test]
    fn finds_device_by_uuid() {
        let mut interop = CudaInterop::new(FakeDriver::with_uuids(vec![[1; 16], [2; 16], [3; 16]]));
        interop.initialize().unwrap();
        assert_eq!(interop.matching_device(&[2; 16]).unwrap(), Some(1));
        assert_eq!(interop.matching_device(&[9; 16]).unwrap(), None);
    }

    #[test]
    fn lookups_require_initialization() {
        let interop = CudaInterop::new(FakeDriver::with_uuids(vec![[1; 16]]));
        assert_eq!(interop.matching_device(&[1; 16]), Err(CudaError::NotInitialized));
    }

    #[test]
    fn initialize_runs_once() {
        let mut interop = CudaInterop::new(FakeDriver::with_uuids(Vec::new()));
        interop.initialize().unwrap();
        interop.initialize().unwrap();
        assert_eq!(interop.api().unwrap().init_calls, 1);

        interop.shutdown();
        assert!(!interop.is_initialized());
    }

    #[test]
    fn failed_init_stays_uninitialized() {
        let mut driver = FakeDriver::with_uuids(Vec::new());
        driver.init_result = Err(CudaError::Driver {
            call: "cuInit",
            code: 100,
        });
        let mut interop = CudaInterop::new(driver);
        assert!(interop.initialize().is_err());
        assert!(!interop.is_initialized());
    }
}
