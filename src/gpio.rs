//! GPIO pin access: Linux sysfs on Linux, `/dev/gpioc<N>` ioctls on
//! FreeBSD. Ported from `set_mode_live`/`get_pulse`/`cleanup` (`input.c`).

use crate::config::Config;
use crate::error::NplError;
use crate::sampler::GpioPin;
use crate::symbol::RawSample;

/// Applies the configured polarity so [`RawSample::High`] always means
/// "carrier dip active", matching `get_pulse`'s `if (!hw.active_high)
/// tmpch = 1 - tmpch;`.
fn normalize(raw: i32, active_high: bool) -> RawSample {
    match raw {
        0 | 1 => {
            let bit = if active_high { raw } else { 1 - raw };
            if bit == 1 {
                RawSample::High
            } else {
                RawSample::Low
            }
        }
        _ => RawSample::Error,
    }
}

#[cfg(target_os = "linux")]
pub mod linux {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::io::{Read, Seek, SeekFrom, Write};

    pub struct LinuxSysfsPin {
        value_file: File,
        active_high: bool,
    }

    impl LinuxSysfsPin {
        pub fn open(config: &Config) -> Result<Self, NplError> {
            export_pin(config.pin)?;
            set_direction_in(config.pin)?;
            let value_file = OpenOptions::new()
                .read(true)
                .open(format!("/sys/class/gpio/gpio{}/value", config.pin))
                .map_err(NplError::Gpio)?;
            Ok(LinuxSysfsPin {
                value_file,
                active_high: config.activehigh,
            })
        }
    }

    fn export_pin(pin: u32) -> Result<(), NplError> {
        let mut export = OpenOptions::new()
            .write(true)
            .open("/sys/class/gpio/export")
            .map_err(NplError::Gpio)?;
        match export.write_all(pin.to_string().as_bytes()) {
            Ok(()) => Ok(()),
            Err(e) if e.raw_os_error() == Some(libc_ebusy()) => Ok(()), // already exported
            Err(e) => Err(NplError::Gpio(e)),
        }
    }

    fn set_direction_in(pin: u32) -> Result<(), NplError> {
        let mut direction = OpenOptions::new()
            .read(true)
            .write(true)
            .open(format!("/sys/class/gpio/gpio{}/direction", pin))
            .map_err(NplError::Gpio)?;
        direction.write_all(b"in").map_err(NplError::Gpio)
    }

    /// `EBUSY`, without pulling in `libc` solely for one constant.
    fn libc_ebusy() -> i32 {
        16
    }

    impl GpioPin for LinuxSysfsPin {
        fn read(&mut self) -> RawSample {
            let mut buf = [0u8; 1];
            if self.value_file.seek(SeekFrom::Start(0)).is_err() {
                return RawSample::Error;
            }
            match self.value_file.read(&mut buf) {
                Ok(1) => normalize((buf[0] - b'0') as i32, self.active_high),
                _ => RawSample::Error,
            }
        }
    }
}

#[cfg(target_os = "freebsd")]
pub mod freebsd {
    use super::*;
    use nix::{ioctl_readwrite, ioctl_write_ptr};
    use std::fs::{File, OpenOptions};
    use std::os::unix::io::AsRawFd;

    #[repr(C)]
    struct GpioPinConfig {
        gp_pin: u32,
        gp_flags: i32,
        gp_name: [u8; 64],
    }

    #[repr(C)]
    struct GpioReq {
        gp_pin: u32,
        gp_value: i32,
    }

    const GPIO_PIN_INPUT: i32 = 0x0002;

    ioctl_write_ptr!(gpio_set_config, b'G', 11, GpioPinConfig);
    ioctl_readwrite!(gpio_get, b'G', 9, GpioReq);

    pub struct FreeBsdGpioPin {
        file: File,
        pin: u32,
        active_high: bool,
    }

    impl FreeBsdGpioPin {
        pub fn open(config: &Config) -> Result<Self, NplError> {
            let iodev = config
                .iodev
                .ok_or(NplError::ConfigMissingKey("iodev"))?;
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(format!("/dev/gpioc{}", iodev))
                .map_err(NplError::Gpio)?;
            let mut pin_config = GpioPinConfig {
                gp_pin: config.pin,
                gp_flags: GPIO_PIN_INPUT,
                gp_name: [0; 64],
            };
            unsafe { gpio_set_config(file.as_raw_fd(), &mut pin_config) }.map_err(|e| {
                NplError::Gpio(std::io::Error::from_raw_os_error(e as i32))
            })?;
            Ok(FreeBsdGpioPin {
                file,
                pin: config.pin,
                active_high: config.activehigh,
            })
        }
    }

    impl GpioPin for FreeBsdGpioPin {
        fn read(&mut self) -> RawSample {
            let mut req = GpioReq {
                gp_pin: self.pin,
                gp_value: 0,
            };
            match unsafe { gpio_get(self.file.as_raw_fd(), &mut req) } {
                Ok(_) => normalize(req.gp_value, self.active_high),
                Err(_) => RawSample::Error,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_active_high() {
        assert_eq!(normalize(1, true), RawSample::High);
        assert_eq!(normalize(0, true), RawSample::Low);
    }

    #[test]
    fn test_normalize_active_low_inverts() {
        assert_eq!(normalize(1, false), RawSample::Low);
        assert_eq!(normalize(0, false), RawSample::High);
    }

    #[test]
    fn test_normalize_invalid_raw_is_error() {
        assert_eq!(normalize(2, true), RawSample::Error);
    }
}
