use anyhow::{Context, Result as AnyResult};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use linux_embedded_hal::{Delay, I2cdev};

use crate::error::{Error, Result};
use crate::units::{AccelRange, GyroRange};

/// Default I2C bus on the Raspberry Pi header
pub const DEFAULT_I2C_DEVICE: &str = "/dev/i2c-1";

/// ICM-20948 address with AD0 high (SparkFun Qwiic board default)
pub const DEFAULT_ADDRESS: u8 = 0x69;

// Bank 0
const WHO_AM_I: u8 = 0x00;
const PWR_MGMT_1: u8 = 0x06;
const PWR_MGMT_2: u8 = 0x07;
const INT_STATUS_1: u8 = 0x1A;
const ACCEL_XOUT_H: u8 = 0x2D;
// Bank 2
const GYRO_CONFIG_1: u8 = 0x01;
const ACCEL_CONFIG: u8 = 0x14;
// All banks
const REG_BANK_SEL: u8 = 0x7F;

const WHO_AM_I_VALUE: u8 = 0xEA;
const DEVICE_RESET: u8 = 0x80;
const CLKSEL_AUTO: u8 = 0x01;
const RAW_DATA_RDY: u8 = 0x01;

/// One burst of raw accelerometer and gyroscope codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawReading {
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
}

/// Where samples come from.
///
/// Neither call may block indefinitely; polling is the caller's job.
pub trait SensorSource {
    fn is_sample_ready(&mut self) -> Result<bool>;
    fn read_raw(&mut self) -> Result<RawReading>;
}

/// ICM-20948 accelerometer + gyroscope over I2C
pub struct ImuController<I> {
    i2c: I,
    address: u8,
    accel_range: AccelRange,
    gyro_range: GyroRange,
}

impl ImuController<I2cdev> {
    /// Open `/dev/i2c-1` at the Qwiic default address with ±2g / ±250 dps
    pub fn new_default() -> AnyResult<Self> {
        Self::new(
            DEFAULT_I2C_DEVICE,
            DEFAULT_ADDRESS,
            AccelRange::default(),
            GyroRange::default(),
        )
    }

    /// Open an I2C device node and bring the sensor up
    pub fn new(
        i2c_device: &str,
        address: u8,
        accel_range: AccelRange,
        gyro_range: GyroRange,
    ) -> AnyResult<Self> {
        let i2c = I2cdev::new(i2c_device)
            .context(format!("Failed to open I2C device: {}", i2c_device))?;

        Self::with_bus(i2c, address, accel_range, gyro_range, &mut Delay)
            .context(format!("Failed to initialize ICM-20948 at 0x{:02X}", address))
    }
}

impl<I: I2c> ImuController<I> {
    /// Reset, wake and configure the sensor on an already-open bus
    pub fn with_bus(
        i2c: I,
        address: u8,
        accel_range: AccelRange,
        gyro_range: GyroRange,
        delay: &mut impl DelayNs,
    ) -> Result<Self> {
        let mut imu = Self {
            i2c,
            address,
            accel_range,
            gyro_range,
        };

        imu.select_bank(0)?;
        let id = imu.read_register(WHO_AM_I)?;
        if id != WHO_AM_I_VALUE {
            return Err(Error::Hardware(format!(
                "unexpected WHO_AM_I 0x{:02X} (expected 0x{:02X})",
                id, WHO_AM_I_VALUE
            )));
        }

        imu.write_register(PWR_MGMT_1, DEVICE_RESET)?;
        delay.delay_ms(50);
        imu.select_bank(0)?;
        imu.write_register(PWR_MGMT_1, CLKSEL_AUTO)?;
        // Enable all accelerometer and gyroscope axes
        imu.write_register(PWR_MGMT_2, 0x00)?;
        delay.delay_ms(10);

        imu.select_bank(2)?;
        imu.write_register(GYRO_CONFIG_1, gyro_range.fs_sel() << 1)?;
        imu.write_register(ACCEL_CONFIG, accel_range.fs_sel() << 1)?;
        imu.select_bank(0)?;

        tracing::info!(
            address = format_args!("0x{:02X}", address),
            ?accel_range,
            ?gyro_range,
            "ICM-20948 initialized"
        );

        Ok(imu)
    }

    pub fn accel_range(&self) -> AccelRange {
        self.accel_range
    }

    pub fn gyro_range(&self) -> GyroRange {
        self.gyro_range
    }

    /// Give the bus back
    pub fn release(self) -> I {
        self.i2c
    }

    fn select_bank(&mut self, bank: u8) -> Result<()> {
        self.write_register(REG_BANK_SEL, (bank & 0x03) << 4)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|e| Error::Hardware(format!("I2C write 0x{:02X}: {:?}", register, e)))
    }

    fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|e| Error::Hardware(format!("I2C read 0x{:02X}: {:?}", register, e)))?;
        Ok(buf[0])
    }
}

impl<I: I2c> SensorSource for ImuController<I> {
    fn is_sample_ready(&mut self) -> Result<bool> {
        Ok(self.read_register(INT_STATUS_1)? & RAW_DATA_RDY != 0)
    }

    fn read_raw(&mut self) -> Result<RawReading> {
        // ACCEL_XOUT_H..GYRO_ZOUT_L, big-endian pairs
        let mut buf = [0u8; 12];
        self.i2c
            .write_read(self.address, &[ACCEL_XOUT_H], &mut buf)
            .map_err(|e| Error::Hardware(format!("I2C burst read: {:?}", e)))?;

        let word = |i: usize| i16::from_be_bytes([buf[2 * i], buf[2 * i + 1]]);
        Ok(RawReading {
            accel: [word(0), word(1), word(2)],
            gyro: [word(3), word(4), word(5)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    /// Register-level ICM-20948 stand-in with bank switching
    struct MockBus {
        banks: [[u8; 128]; 4],
        bank: usize,
        pointer: u8,
        writes: Vec<(usize, u8, u8)>,
        fail: bool,
    }

    impl MockBus {
        fn new() -> Self {
            let mut banks = [[0u8; 128]; 4];
            banks[0][WHO_AM_I as usize] = WHO_AM_I_VALUE;
            Self {
                banks,
                bank: 0,
                pointer: 0,
                writes: Vec::new(),
                fail: false,
            }
        }

        fn set_data(&mut self, accel: [i16; 3], gyro: [i16; 3]) {
            let base = ACCEL_XOUT_H as usize;
            for (i, value) in accel.iter().chain(gyro.iter()).enumerate() {
                let [hi, lo] = value.to_be_bytes();
                self.banks[0][base + 2 * i] = hi;
                self.banks[0][base + 2 * i + 1] = lo;
            }
        }
    }

    impl ErrorType for MockBus {
        type Error = ErrorKind;
    }

    impl I2c for MockBus {
        fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> core::result::Result<(), Self::Error> {
            if self.fail || address != DEFAULT_ADDRESS {
                return Err(ErrorKind::Other);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        self.pointer = bytes[0];
                        for (offset, value) in bytes[1..].iter().enumerate() {
                            let register = self.pointer + offset as u8;
                            if register == REG_BANK_SEL {
                                self.bank = ((*value >> 4) & 0x03) as usize;
                            } else {
                                self.banks[self.bank][register as usize] = *value;
                            }
                            self.writes.push((self.bank, register, *value));
                        }
                    }
                    Operation::Read(buf) => {
                        for (offset, byte) in buf.iter_mut().enumerate() {
                            *byte = self.banks[self.bank][self.pointer as usize + offset];
                        }
                    }
                }
            }
            Ok(())
        }
    }

    fn bring_up(bus: MockBus) -> ImuController<MockBus> {
        ImuController::with_bus(
            bus,
            DEFAULT_ADDRESS,
            AccelRange::G8,
            GyroRange::Dps1000,
            &mut NoDelay,
        )
        .unwrap()
    }

    #[test]
    fn test_init_configures_ranges_in_bank_2() {
        let imu = bring_up(MockBus::new());
        let bus = imu.release();
        assert!(bus.writes.contains(&(2, GYRO_CONFIG_1, 2 << 1)));
        assert!(bus.writes.contains(&(2, ACCEL_CONFIG, 2 << 1)));
        assert!(bus.writes.contains(&(0, PWR_MGMT_1, CLKSEL_AUTO)));
        // Left in bank 0 for data reads
        assert_eq!(bus.bank, 0);
    }

    #[test]
    fn test_wrong_device_rejected() {
        let mut bus = MockBus::new();
        bus.banks[0][WHO_AM_I as usize] = 0x71;
        let result = ImuController::with_bus(
            bus,
            DEFAULT_ADDRESS,
            AccelRange::G2,
            GyroRange::Dps250,
            &mut NoDelay,
        );
        assert!(matches!(result, Err(Error::Hardware(_))));
    }

    #[test]
    fn test_read_raw_decodes_big_endian() {
        let mut imu = bring_up(MockBus::new());
        imu.i2c.set_data([16384, -2, 300], [-131, 0, 32767]);

        let reading = imu.read_raw().unwrap();
        assert_eq!(reading.accel, [16384, -2, 300]);
        assert_eq!(reading.gyro, [-131, 0, 32767]);
    }

    #[test]
    fn test_data_ready_flag() {
        let mut imu = bring_up(MockBus::new());
        assert!(!imu.is_sample_ready().unwrap());
        imu.i2c.banks[0][INT_STATUS_1 as usize] = RAW_DATA_RDY;
        assert!(imu.is_sample_ready().unwrap());
    }

    #[test]
    fn test_bus_errors_become_hardware_errors() {
        let mut imu = bring_up(MockBus::new());
        imu.i2c.fail = true;
        assert!(matches!(imu.read_raw(), Err(Error::Hardware(_))));
        assert!(matches!(imu.is_sample_ready(), Err(Error::Hardware(_))));
    }
}
