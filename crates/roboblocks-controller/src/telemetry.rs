use serde::Serialize;

/// Telemetry key for the temperature slot.
pub const KEY_TEMPERATURE: &str = "temp";
pub const KEY_LIGHT_LEVEL: &str = "brightness";
pub const KEY_COMPASS_HEADING: &str = "compass";
pub const KEY_ACCELEROMETER_X: &str = "accX";
pub const KEY_ACCELEROMETER_Y: &str = "accY";
pub const KEY_ACCELEROMETER_Z: &str = "accZ";
pub const KEY_ACCELEROMETER_A: &str = "accA";

pub const FIELD_TEMPERATURE: &str = "roboMicrobitTemperature";
pub const FIELD_LIGHT_LEVEL: &str = "roboMicrobitLightLevel";
pub const FIELD_COMPASS_HEADING: &str = "roboMicrobitCompassHeading";
pub const FIELD_ACCELEROMETER_X: &str = "roboMicrobitAccelerometerX";
pub const FIELD_ACCELEROMETER_Y: &str = "roboMicrobitAccelerometerY";
pub const FIELD_ACCELEROMETER_Z: &str = "roboMicrobitAccelerometerZ";
pub const FIELD_ACCELEROMETER_A: &str = "roboMicrobitAccelerometerA";
pub const FIELD_CUSTOM_MESSAGE: &str = "roboMicrobitCustomMessage";

/// Separates the custom key from its value in the custom message field.
pub const CUSTOM_SEPARATOR: char = ':';

/// A custom telemetry entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomValue {
    pub name: String,
    pub value: f64,
}

/// Telemetry waiting to be sent.
///
/// Seven fixed slots plus one custom slot. Setting an unrecognized key
/// replaces whatever custom entry is pending.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Telemetry {
    pub temperature: Option<f64>,
    pub light_level: Option<f64>,
    pub compass_heading: Option<f64>,
    pub accelerometer_x: Option<f64>,
    pub accelerometer_y: Option<f64>,
    pub accelerometer_z: Option<f64>,
    pub accelerometer_a: Option<f64>,
    pub custom: Option<CustomValue>,
}

impl Telemetry {
    /// Store `value` in the slot named by `key`.
    pub fn set(&mut self, key: &str, value: f64) {
        let slot = match key {
            KEY_TEMPERATURE => &mut self.temperature,
            KEY_LIGHT_LEVEL => &mut self.light_level,
            KEY_COMPASS_HEADING => &mut self.compass_heading,
            KEY_ACCELEROMETER_X => &mut self.accelerometer_x,
            KEY_ACCELEROMETER_Y => &mut self.accelerometer_y,
            KEY_ACCELEROMETER_Z => &mut self.accelerometer_z,
            KEY_ACCELEROMETER_A => &mut self.accelerometer_a,
            name => {
                self.custom = Some(CustomValue {
                    name: name.to_string(),
                    value,
                });
                return;
            }
        };
        *slot = Some(value);
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Relay fields for every populated slot, in wire order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let fixed = [
            (FIELD_TEMPERATURE, self.temperature),
            (FIELD_LIGHT_LEVEL, self.light_level),
            (FIELD_COMPASS_HEADING, self.compass_heading),
            (FIELD_ACCELEROMETER_X, self.accelerometer_x),
            (FIELD_ACCELEROMETER_Y, self.accelerometer_y),
            (FIELD_ACCELEROMETER_Z, self.accelerometer_z),
            (FIELD_ACCELEROMETER_A, self.accelerometer_a),
        ];

        let mut fields: Vec<_> = fixed
            .into_iter()
            .filter_map(|(field, value)| value.map(|v| (field, format_number(v))))
            .collect();

        if let Some(custom) = &self.custom {
            fields.push((
                FIELD_CUSTOM_MESSAGE,
                format!(
                    "{}{CUSTOM_SEPARATOR}{}",
                    custom.name,
                    format_number(custom.value)
                ),
            ));
        }
        fields
    }
}

/// Format a telemetry number.
///
/// Integral values print without a fractional part; non-finite values print
/// as `NaN`, `Infinity` and `-Infinity`. Magnitudes of at least `1e21` or
/// below `1e-6` use exponent notation with a signed exponent (`1e+21`,
/// `1.5e-7`).
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let formatted = format!("{value:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        };
    }
    if value.fract() == 0.0 {
        return format!("{value:.0}");
    }
    value.to_string()
}
