//! Hardware and usage facts supplied by the embedding layer
//!
//! Resolution never probes a device itself. The caller inspects the host
//! once, fills in a [`HardwareContext`], and passes it to every resolution.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Device types the engine can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// NVIDIA CUDA GPU
    Cuda,

    /// AMD ROCm GPU
    Rocm,

    /// CPU only
    Cpu,

    /// Apple Metal
    Metal,
}

impl DeviceType {
    /// Whether this device kind counts as an accelerator
    pub fn is_accelerator(&self) -> bool {
        !matches!(self, DeviceType::Cpu)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Cuda => "cuda",
            DeviceType::Rocm => "rocm",
            DeviceType::Cpu => "cpu",
            DeviceType::Metal => "metal",
        };
        write!(f, "{}", name)
    }
}

/// CUDA-style compute capability, e.g. 8.0 for Ampere or 9.0 for Hopper
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComputeCapability {
    /// Major version
    pub major: u32,

    /// Minor version
    pub minor: u32,
}

impl ComputeCapability {
    /// Create a compute capability from its major and minor parts
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ComputeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Host facts gathered once by the caller's hardware probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareContext {
    /// Kind of device the engine will run on
    pub device: DeviceType,

    /// Marketing name reported by the driver, e.g. "NVIDIA H100 80GB HBM3"
    pub device_name: String,

    /// Compute capability, when the device reports one
    pub compute_capability: Option<ComputeCapability>,

    /// Whether the host has a usable accelerator
    pub is_accelerator: bool,
}

impl HardwareContext {
    /// Context for a CUDA device with the given name and capability
    pub fn cuda(device_name: impl Into<String>, compute_capability: ComputeCapability) -> Self {
        Self {
            device: DeviceType::Cuda,
            device_name: device_name.into(),
            compute_capability: Some(compute_capability),
            is_accelerator: true,
        }
    }

    /// Context for a CPU-only host
    pub fn cpu() -> Self {
        Self {
            device: DeviceType::Cpu,
            device_name: "cpu".to_string(),
            compute_capability: None,
            is_accelerator: false,
        }
    }
}

/// How the engine is being embedded
///
/// Batching defaults differ between in-process library use and the
/// standalone API server, which favors lower time to first token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageContext {
    /// Driven in-process through the library API
    Library,

    /// Driven by the standalone API server
    ApiServer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accelerator_kinds() {
        assert!(DeviceType::Cuda.is_accelerator());
        assert!(DeviceType::Rocm.is_accelerator());
        assert!(DeviceType::Metal.is_accelerator());
        assert!(!DeviceType::Cpu.is_accelerator());
    }

    #[test]
    fn test_compute_capability_ordering() {
        let ampere = ComputeCapability::new(8, 0);
        let volta = ComputeCapability::new(7, 0);
        let hopper = ComputeCapability::new(9, 0);
        assert!(volta < ampere);
        assert!(ampere < hopper);
        assert_eq!(ampere.to_string(), "8.0");
    }

    #[test]
    fn test_probe_constructors() {
        let gpu = HardwareContext::cuda("NVIDIA A100-SXM4-80GB", ComputeCapability::new(8, 0));
        assert!(gpu.is_accelerator);
        assert_eq!(gpu.device, DeviceType::Cuda);

        let host = HardwareContext::cpu();
        assert!(!host.is_accelerator);
        assert_eq!(host.compute_capability, None);
    }
}
