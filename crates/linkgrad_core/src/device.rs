#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Where an array's storage lives.
///
/// `Accel` arrays belong to an accelerator context identified by its ordinal. The
/// driver layer is not part of this crate, so accelerator storage is a host-side
/// mirror and the ordinal only drives device selection and backend dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Device {
    CPU,
    Accel(usize),
}

impl Device {
    pub fn name(&self) -> String {
        match self {
            Device::CPU => "CPU".to_string(),
            Device::Accel(id) => format!("Accel Device {}", id),
        }
    }

    pub fn is_accel(&self) -> bool {
        matches!(self, Device::Accel(_))
    }
}

thread_local! {
    static DEFAULT_DEVICE: std::cell::Cell<Device> = const { std::cell::Cell::new(Device::CPU) };
}

pub fn get_default_device() -> Device {
    DEFAULT_DEVICE.with(|d| d.get())
}

pub fn set_default_device(device: Device) {
    DEFAULT_DEVICE.with(|d| d.set(device));
}

/// Makes `device` the current device until dropped.
pub struct DeviceGuard {
    prev_device: Device,
}

impl DeviceGuard {
    pub fn new(device: Device) -> Self {
        let prev_device = get_default_device();
        set_default_device(device);
        Self { prev_device }
    }

    /// Selects the device of the first accelerator-resident array, or keeps the
    /// current device when every array is on the host.
    pub fn for_devices<I>(devices: I) -> Self
    where
        I: IntoIterator<Item = Device>,
    {
        let device = devices
            .into_iter()
            .find(Device::is_accel)
            .unwrap_or_else(get_default_device);
        Self::new(device)
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        set_default_device(self.prev_device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_previous_device() {
        set_default_device(Device::CPU);
        {
            let _outer = DeviceGuard::new(Device::Accel(1));
            assert_eq!(get_default_device(), Device::Accel(1));
            {
                let _inner = DeviceGuard::for_devices([Device::CPU, Device::Accel(3)]);
                assert_eq!(get_default_device(), Device::Accel(3));
            }
            assert_eq!(get_default_device(), Device::Accel(1));
        }
        assert_eq!(get_default_device(), Device::CPU);
    }

    #[test]
    fn host_arrays_keep_current_device() {
        set_default_device(Device::CPU);
        let _guard = DeviceGuard::for_devices([Device::CPU, Device::CPU]);
        assert_eq!(get_default_device(), Device::CPU);
    }
}
