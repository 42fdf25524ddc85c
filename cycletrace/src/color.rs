//! Percentage-to-color mapping.
//!
//! A percentage maps to a wavelength on the blue-to-red band
//! (440 nm + 2.2 nm per point), then through the standard
//! visible-spectrum approximation to RGB at 70 % brightness.

pub fn color_from_percent(percent: f64) -> String {
    let wavelength = 440.0 + percent * (220.0 / 100.0);

    let (r, g, b) = if wavelength < 490.0 {
        (0.0, (wavelength - 440.0) / (490.0 - 440.0), 1.0)
    } else if wavelength < 510.0 {
        (0.0, 1.0, -(wavelength - 510.0) / (510.0 - 490.0))
    } else if wavelength < 580.0 {
        ((wavelength - 510.0) / (580.0 - 510.0), 1.0, 0.0)
    } else if wavelength < 645.0 {
        (1.0, -(wavelength - 645.0) / (645.0 - 580.0), 0.0)
    } else {
        (1.0, 0.0, 0.0)
    };

    format!(
        "#{:02x}{:02x}{:02x}",
        (r * 255.0 * 0.7) as u8,
        (g * 255.0 * 0.7) as u8,
        (b * 255.0 * 0.7) as u8
    )
}
