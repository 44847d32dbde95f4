use std::fmt;

/// A configured remote screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    /// Lounge screen identifier
    pub screen_id: String,
    /// Display name used in logs
    pub name: String,
    /// Latency compensation in seconds, subtracted from every skip delay
    pub offset: f64,
}

impl Device {
    pub fn new(screen_id: impl Into<String>, name: impl Into<String>, offset: f64) -> Self {
        Self {
            screen_id: screen_id.into(),
            name: name.into(),
            offset,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.screen_id)
        } else {
            f.write_str(&self.name)
        }
    }
}
