use crate::screen::OrientationReading;
use std::path::{Path, PathBuf};
use std::{fs, io};

const IIO_DEVICES: &str = "/sys/bus/iio/devices";

/// Accelerometer exposed by the kernel IIO subsystem.
#[derive(Debug, Clone)]
pub(crate) struct Accelerometer {
    device: PathBuf,
}

impl Accelerometer {
    pub(crate) fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// First IIO device with raw acceleration channels.
    pub(crate) fn find() -> Option<Self> {
        let entries = fs::read_dir(IIO_DEVICES).ok()?;
        let device = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .find(|path| path.join("in_accel_x_raw").exists())?;
        log::debug!("Using accelerometer {}", device.display());
        Some(Self::new(device))
    }

    fn read_axis(&self, axis: &str) -> io::Result<i64> {
        let path = self.device.join(format!("in_accel_{axis}_raw"));
        let raw = fs::read_to_string(&path)?;
        raw.trim()
            .parse()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, format!("{}: {err}", path.display())))
    }

    pub(crate) fn read(&self) -> io::Result<OrientationReading> {
        Ok(classify(
            self.read_axis("x")?,
            self.read_axis("y")?,
            self.read_axis("z")?,
        ))
    }

    pub(crate) fn device(&self) -> &Path {
        &self.device
    }
}

/// Maps the gravity vector, in device coordinates, to the edge that points up.
fn classify(x: i64, y: i64, z: i64) -> OrientationReading {
    let (ax, ay, az) = (x.abs(), y.abs(), z.abs());
    if ax == 0 && ay == 0 && az == 0 {
        OrientationReading::Undefined
    } else if az > ax && az > ay {
        if z > 0 {
            OrientationReading::FaceUp
        } else {
            OrientationReading::FaceDown
        }
    } else if ay >= ax {
        if y > 0 {
            OrientationReading::TopUp
        } else {
            OrientationReading::TopDown
        }
    } else if x < 0 {
        OrientationReading::LeftUp
    } else {
        OrientationReading::RightUp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        // Arrange
        struct TestCase {
            gravity: (i64, i64, i64),
            reading: OrientationReading,
        }

        let test_cases = [
            TestCase {
                gravity: (0, 980, 30),
                reading: OrientationReading::TopUp,
            },
            TestCase {
                gravity: (20, -975, -40),
                reading: OrientationReading::TopDown,
            },
            TestCase {
                gravity: (-990, 100, 0),
                reading: OrientationReading::LeftUp,
            },
            TestCase {
                gravity: (985, -60, 10),
                reading: OrientationReading::RightUp,
            },
            TestCase {
                gravity: (10, 10, 1000),
                reading: OrientationReading::FaceUp,
            },
            TestCase {
                gravity: (10, 10, -1000),
                reading: OrientationReading::FaceDown,
            },
            TestCase {
                gravity: (0, 0, 0),
                reading: OrientationReading::Undefined,
            },
        ];

        for test_case in test_cases {
            let (x, y, z) = test_case.gravity;

            // Act
            let reading = classify(x, y, z);

            // Assert
            assert_eq!(reading, test_case.reading, "{:?}", test_case.gravity);
        }
    }

    #[test]
    fn read_uses_raw_channels() {
        // Arrange
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("in_accel_x_raw"), "-1012\n").expect("writes");
        fs::write(dir.path().join("in_accel_y_raw"), "37\n").expect("writes");
        fs::write(dir.path().join("in_accel_z_raw"), "-5\n").expect("writes");
        let accelerometer = Accelerometer::new(dir.path());

        // Act
        let reading = accelerometer.read();

        // Assert
        assert_eq!(reading.ok(), Some(OrientationReading::LeftUp));
    }

    #[test]
    fn missing_channel_is_an_error() {
        // Arrange
        let dir = tempfile::tempdir().expect("temp dir");
        let accelerometer = Accelerometer::new(dir.path());

        // Act
        let reading = accelerometer.read();

        // Assert
        assert!(reading.is_err());
    }
}
