//! MPU-6050 gyro driver (Z axis only)
//!
//! Register access goes through any blocking `embedded-hal` I2C bus. The
//! device is configured for the ±250 °/s range, which is the power-on default.

use super::{RateSensor, Sensor};
use crate::error::{Error, Result};
use embedded_hal::i2c::I2c;

/// Default I2C address (AD0 low)
pub const DEFAULT_ADDRESS: u8 = 0x68;

const PWR_MGMT_1: u8 = 0x6B;
const GYRO_ZOUT_H: u8 = 0x47;

/// LSB per °/s at ±250 °/s
const GYRO_SCALE: f64 = 131.0;

/// MPU-6050 yaw-rate sensor
pub struct Mpu6050<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Mpu6050<I2C> {
    /// Wake the device out of sleep mode.
    ///
    /// The gyro needs roughly 100 ms after wake-up before readings settle;
    /// calibrate only after that.
    pub fn new(i2c: I2C, address: u8) -> Result<Self> {
        let mut sensor = Self { i2c, address };
        sensor
            .i2c
            .write(sensor.address, &[PWR_MGMT_1, 0x00])
            .map_err(|e| Error::sensor("mpu6050", format!("wake failed: {:?}", e)))?;
        log::debug!("MPU-6050 at {:#04x} awake", address);
        Ok(sensor)
    }

    /// Raw signed Z-axis reading
    pub fn read_raw_z(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[GYRO_ZOUT_H], &mut buf)
            .map_err(|e| Error::sensor("mpu6050", format!("read failed: {:?}", e)))?;
        Ok(i16::from_be_bytes(buf))
    }

    /// Release the bus
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C> Sensor for Mpu6050<I2C> {
    fn name(&self) -> &str {
        "mpu6050"
    }
}

impl<I2C: I2c + Send> RateSensor for Mpu6050<I2C> {
    fn read_rate_dps(&mut self) -> Result<f64> {
        Ok(self.read_raw_z()? as f64 / GYRO_SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation, SevenBitAddress};

    /// Register-file I2C fake with an auto-incrementing register pointer
    struct FakeBus {
        registers: [u8; 128],
        pointer: u8,
        fail: bool,
    }

    impl FakeBus {
        fn new() -> Self {
            let mut registers = [0u8; 128];
            registers[PWR_MGMT_1 as usize] = 0x40; // sleep bit set at power-on
            Self {
                registers,
                pointer: 0,
                fail: false,
            }
        }

        fn set_z(&mut self, raw: i16) {
            let [hi, lo] = raw.to_be_bytes();
            self.registers[GYRO_ZOUT_H as usize] = hi;
            self.registers[GYRO_ZOUT_H as usize + 1] = lo;
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c<SevenBitAddress> for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> std::result::Result<(), Self::Error> {
            if self.fail || address != DEFAULT_ADDRESS {
                return Err(ErrorKind::Other);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        if let Some((reg, data)) = bytes.split_first() {
                            self.pointer = *reg;
                            for byte in data {
                                self.registers[self.pointer as usize] = *byte;
                                self.pointer += 1;
                            }
                        }
                    }
                    Operation::Read(buf) => {
                        for byte in buf.iter_mut() {
                            *byte = self.registers[self.pointer as usize];
                            self.pointer += 1;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_new_clears_sleep_bit() {
        let sensor = Mpu6050::new(FakeBus::new(), DEFAULT_ADDRESS).unwrap();
        let bus = sensor.release();
        assert_eq!(bus.registers[PWR_MGMT_1 as usize], 0);
    }

    #[test]
    fn test_rate_scaling_and_sign() {
        let mut bus = FakeBus::new();
        bus.set_z(-262);
        let mut sensor = Mpu6050::new(bus, DEFAULT_ADDRESS).unwrap();
        assert_eq!(sensor.read_raw_z().unwrap(), -262);
        assert_relative_eq!(sensor.read_rate_dps().unwrap(), -2.0);

        let mut bus = sensor.release();
        bus.set_z(i16::MAX);
        let mut sensor = Mpu6050::new(bus, DEFAULT_ADDRESS).unwrap();
        assert_relative_eq!(sensor.read_rate_dps().unwrap(), 32767.0 / 131.0);
    }

    #[test]
    fn test_bus_failure_is_sensor_unavailable() {
        let mut sensor = Mpu6050::new(FakeBus::new(), DEFAULT_ADDRESS).unwrap();
        sensor.i2c.fail = true;
        assert!(matches!(
            sensor.read_rate_dps(),
            Err(Error::SensorUnavailable { .. })
        ));
        assert!(Mpu6050::new(FakeBus::new(), 0x69).is_err());
    }
}
