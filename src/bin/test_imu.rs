use anyhow::Result;
use std::thread;
use std::time::{Duration, Instant};

use spinwheel_runtime::fusion::{sanitize_dt, FusionConfig};
use spinwheel_runtime::imu::{ImuController, SensorSource};
use spinwheel_runtime::linear::{extract, gravity_vector};
use spinwheel_runtime::units::{UnitConverter, STANDARD_GRAVITY};

fn main() -> Result<()> {
    println!("ICM-20948 IMU Test Program");
    println!("==========================\n");

    println!("Initializing ICM-20948 on /dev/i2c-1 at address 0x69...");
    let mut imu = ImuController::new_default()?;
    println!("✓ ICM-20948 initialized successfully\n");

    let converter = UnitConverter::for_ranges(imu.accel_range(), imu.gyro_range());
    let mut filter = FusionConfig::default().build();

    println!("Reading IMU data (Ctrl+C to stop):\n");
    println!("{:>8} {:>8} {:>8} | {:>8} {:>8} {:>8} | {:>8} {:>8} {:>8} | {:>7} {:>7} {:>7}",
             "Acc X", "Acc Y", "Acc Z",
             "Gyro X", "Gyro Y", "Gyro Z",
             "Lin X", "Lin Y", "Lin Z",
             "Roll", "Pitch", "Yaw");
    println!("{}", "-".repeat(112));

    let mut last = Instant::now();
    let mut printed = Instant::now();

    loop {
        if !imu.is_sample_ready()? {
            thread::sleep(Duration::from_millis(1));
            continue;
        }

        let raw = imu.read_raw()?;
        let now = Instant::now();
        let dt = sanitize_dt(now.duration_since(last).as_secs_f64());
        last = now;

        let reading = converter.to_physical(raw.accel, raw.gyro);
        let q = filter.update(reading.gyro, reading.accel.map(|a| a / STANDARD_GRAVITY), dt);
        let linear = extract(reading.accel, gravity_vector(&q));

        // Fuse at full rate, print at 10 Hz
        if printed.elapsed() >= Duration::from_millis(100) {
            printed = Instant::now();
            let [roll, pitch, yaw] = q.to_euler();
            println!("{:8.3} {:8.3} {:8.3} | {:8.3} {:8.3} {:8.3} | {:8.3} {:8.3} {:8.3} | {:7.1} {:7.1} {:7.1}",
                     reading.accel[0], reading.accel[1], reading.accel[2],
                     reading.gyro[0], reading.gyro[1], reading.gyro[2],
                     linear[0], linear[1], linear[2],
                     roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees());
        }
    }
}
