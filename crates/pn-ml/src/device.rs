//! Execution devices

use std::fmt;

/// Where a model runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    /// Host CPU
    #[default]
    Cpu,
    /// Accelerator by index
    Gpu(usize),
}

/// Device without its index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

impl Device {
    /// CPU when no GPU index is given
    pub fn from_gpu(gpu: Option<usize>) -> Self {
        gpu.map(Device::Gpu).unwrap_or(Device::Cpu)
    }

    /// Device kind
    pub fn kind(&self) -> DeviceKind {
        match self {
            Device::Cpu => DeviceKind::Cpu,
            Device::Gpu(_) => DeviceKind::Gpu,
        }
    }

    /// Runs on an accelerator
    pub fn is_accelerator(&self) -> bool {
        self.kind() == DeviceKind::Gpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Gpu(index) => write!(f, "cuda:{}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_gpu() {
        assert_eq!(Device::from_gpu(None), Device::Cpu);
        assert_eq!(Device::from_gpu(Some(1)), Device::Gpu(1));
    }

    #[test]
    fn test_kind_ignores_index() {
        assert_eq!(Device::Gpu(0).kind(), Device::Gpu(3).kind());
        assert!(Device::Gpu(0).is_accelerator());
        assert!(!Device::Cpu.is_accelerator());
    }

    #[test]
    fn test_display() {
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::Gpu(2).to_string(), "cuda:2");
    }
}
