use anyhow::Result;
use async_trait::async_trait;
use log::info;
#[cfg(target_arch = "aarch64")]
use anyhow::Context;
#[cfg(target_arch = "aarch64")]
use tokio::sync::Mutex;

use crate::config::GpioConfig;

/// Drives the physical bin lid. Failures are reported to the caller, which
/// only logs them; the on-screen lid state never depends on the hardware.
#[async_trait]
pub trait BinActuator: Send + Sync {
    async fn open(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

/// Lid solenoid on a GPIO output pin, held high while the lid is open.
#[cfg(target_arch = "aarch64")]
pub struct GpioBinActuator {
    pin: Mutex<rppal::gpio::OutputPin>,
    pin_number: u8,
}

#[cfg(target_arch = "aarch64")]
impl GpioBinActuator {
    pub fn new(pin_number: u8) -> Result<Self> {
        let gpio = rppal::gpio::Gpio::new().context("Failed to initialize GPIO")?;
        let pin = gpio
            .get(pin_number)
            .with_context(|| format!("Failed to get GPIO pin {}", pin_number))?
            .into_output_low();
        info!("GPIO pin {} configured for bin lid", pin_number);
        Ok(Self {
            pin: Mutex::new(pin),
            pin_number,
        })
    }
}

#[cfg(target_arch = "aarch64")]
#[async_trait]
impl BinActuator for GpioBinActuator {
    async fn open(&self) -> Result<()> {
        self.pin.lock().await.set_high();
        info!("Bin lid opened (pin {})", self.pin_number);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pin.lock().await.set_low();
        info!("Bin lid closed (pin {})", self.pin_number);
        Ok(())
    }
}

/// Stand-in for development machines without a lid attached.
#[derive(Debug, Default)]
pub struct SimulatedBinActuator;

#[async_trait]
impl BinActuator for SimulatedBinActuator {
    async fn open(&self) -> Result<()> {
        info!("Simulated bin lid opened");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        info!("Simulated bin lid closed");
        Ok(())
    }
}

// Factory function that returns appropriate actuator based on platform
pub fn create_actuator(config: &GpioConfig) -> Box<dyn BinActuator> {
    if !config.enabled {
        info!("GPIO disabled in configuration, simulating bin lid");
        return Box::new(SimulatedBinActuator);
    }

    #[cfg(target_arch = "aarch64")]
    {
        match GpioBinActuator::new(config.lid_pin) {
            Ok(actuator) => Box::new(actuator),
            Err(e) => {
                log::warn!("GPIO initialization failed: {}. Running in simulation mode.", e);
                Box::new(SimulatedBinActuator)
            }
        }
    }

    #[cfg(not(target_arch = "aarch64"))]
    {
        log::warn!("Not running on ARM64, simulating bin lid on pin {}", config.lid_pin);
        Box::new(SimulatedBinActuator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_simulated_actuator_always_succeeds() {
        let actuator = SimulatedBinActuator;
        assert!(actuator.open().await.is_ok());
        assert!(actuator.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_gpio_falls_back_to_simulation() {
        let config = Config::development_desktop();
        assert!(!config.gpio.enabled);
        let actuator = create_actuator(&config.gpio);
        assert!(actuator.open().await.is_ok());
        assert!(actuator.close().await.is_ok());
    }
}
