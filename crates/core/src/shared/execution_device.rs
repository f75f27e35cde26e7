use std::fmt;
use std::str::FromStr;

/// Compute device the ONNX sessions are bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionDevice {
    Cpu,
    CoreMl,
    DirectMl,
}

impl ExecutionDevice {
    /// The platform's preferred accelerator, CPU where none is wired up.
    pub fn preferred() -> Self {
        #[cfg(target_os = "macos")]
        {
            Self::CoreMl
        }
        #[cfg(target_os = "windows")]
        {
            Self::DirectMl
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            Self::Cpu
        }
    }

    /// ONNX execution providers for this device. Registration failure is an
    /// error rather than a silent CPU fallback.
    pub fn execution_providers(&self) -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
        match self {
            Self::Cpu => vec![],
            #[cfg(target_os = "macos")]
            Self::CoreMl => {
                vec![ort::execution_providers::CoreMLExecutionProvider::default()
                    .build()
                    .error_on_failure()]
            }
            #[cfg(target_os = "windows")]
            Self::DirectMl => {
                vec![ort::execution_providers::DirectMLExecutionProvider::default()
                    .build()
                    .error_on_failure()]
            }
            #[allow(unreachable_patterns)]
            _ => vec![],
        }
    }
}

impl fmt::Display for ExecutionDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cpu => "cpu",
            Self::CoreMl => "coreml",
            Self::DirectMl => "directml",
        };
        f.write_str(name)
    }
}

/// Runs `open` on `device`, retrying once on CPU when an accelerator fails.
/// Returns the device the value was actually opened on.
pub fn open_with_cpu_fallback<T, E: fmt::Display>(
    device: ExecutionDevice,
    mut open: impl FnMut(ExecutionDevice) -> Result<T, E>,
) -> Result<(T, ExecutionDevice), E> {
    match open(device) {
        Ok(value) => Ok((value, device)),
        Err(e) if device != ExecutionDevice::Cpu => {
            log::warn!("{device} execution provider unavailable ({e}); falling back to cpu");
            open(ExecutionDevice::Cpu).map(|value| (value, ExecutionDevice::Cpu))
        }
        Err(e) => Err(e),
    }
}

/// Device selection as requested in configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DevicePreference {
    Auto,
    Cpu,
}

impl DevicePreference {
    pub fn resolve(self) -> ExecutionDevice {
        match self {
            Self::Auto => ExecutionDevice::preferred(),
            Self::Cpu => ExecutionDevice::Cpu,
        }
    }
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            other => Err(format!("unknown device '{other}', expected 'auto' or 'cpu'")),
        }
    }
}
