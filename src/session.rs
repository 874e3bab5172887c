use std::collections::BTreeMap;

use crate::cli::TextSpeed;
use crate::config::Preferences;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub enabled: bool,
    pub latitude: String,
    pub longitude: String,
}

impl Location {
    /// Validate and store a coordinate pair. Leaves the location unchanged
    /// on error.
    pub fn set(&mut self, latitude: &str, longitude: &str) -> Result<(), String> {
        let lat: f64 = latitude
            .trim()
            .parse()
            .map_err(|_| format!("invalid latitude '{latitude}'"))?;
        let lon: f64 = longitude
            .trim()
            .parse()
            .map_err(|_| format!("invalid longitude '{longitude}'"))?;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(format!("latitude {lat} is outside -90..90"));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(format!("longitude {lon} is outside -180..180"));
        }
        self.latitude = latitude.trim().to_string();
        self.longitude = longitude.trim().to_string();
        Ok(())
    }
}

/// Mutable per-run settings owned by the shell and handed to every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub default_to_chat: bool,
    pub text_speed: TextSpeed,
    pub text_buffer: bool,
    pub testing: bool,
    pub startup_enabled: bool,
    pub startup_commands: Vec<String>,
    pub shortcuts_enabled: bool,
    pub shortcuts: BTreeMap<String, String>,
    pub location: Location,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::from_preferences(&Preferences::default())
    }
}

impl SessionState {
    pub fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            default_to_chat: prefs.default_to_chat,
            text_speed: prefs.text_speed,
            text_buffer: prefs.text_buffer,
            testing: false,
            startup_enabled: prefs.startup_enabled,
            startup_commands: prefs.startup_commands.clone(),
            shortcuts_enabled: prefs.shortcuts_enabled,
            shortcuts: prefs.shortcuts.clone(),
            location: Location {
                enabled: prefs.location_enabled,
                latitude: prefs.latitude.clone(),
                longitude: prefs.longitude.clone(),
            },
        }
    }

    pub fn apply_to(&self, prefs: &mut Preferences) {
        prefs.default_to_chat = self.default_to_chat;
        prefs.text_speed = self.text_speed;
        prefs.text_buffer = self.text_buffer;
        prefs.startup_enabled = self.startup_enabled;
        prefs.startup_commands = self.startup_commands.clone();
        prefs.shortcuts_enabled = self.shortcuts_enabled;
        prefs.shortcuts = self.shortcuts.clone();
        prefs.location_enabled = self.location.enabled;
        prefs.latitude = self.location.latitude.clone();
        prefs.longitude = self.location.longitude.clone();
    }

    pub fn add_startup(&mut self, command: &str) {
        self.startup_commands.push(command.trim().to_string());
    }

    /// Remove by exact text or by 1-based position as shown in `list`.
    pub fn remove_startup(&mut self, selector: &str) -> Option<String> {
        let selector = selector.trim();
        if let Some(pos) = self.startup_commands.iter().position(|c| c == selector) {
            return Some(self.startup_commands.remove(pos));
        }
        let index = selector.parse::<usize>().ok()?;
        if index == 0 || index > self.startup_commands.len() {
            return None;
        }
        Some(self.startup_commands.remove(index - 1))
    }

    pub fn add_shortcut(&mut self, alias: &str, expansion: &str) -> Option<String> {
        self.shortcuts
            .insert(alias.trim().to_string(), expansion.trim().to_string())
    }

    pub fn remove_shortcut(&mut self, alias: &str) -> Option<String> {
        self.shortcuts.remove(alias.trim())
    }

    /// Expansion for `alias`, or `None` when unknown or shortcuts are off.
    pub fn expand_shortcut(&self, alias: &str) -> Option<&str> {
        if !self.shortcuts_enabled {
            return None;
        }
        self.shortcuts.get(alias).map(String::as_str)
    }

    pub fn effective_speed(&self) -> TextSpeed {
        if self.testing {
            TextSpeed::Nodelay
        } else {
            self.text_speed
        }
    }
}
