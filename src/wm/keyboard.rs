//! Keyboard Module
//!
//! Key binding table: configured key names resolved to keysyms and mapped to
//! the action they trigger. All bindings live under the Super modifier.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::KeyBindingConfig;
use crate::wm::conn::{Keysym, MOD_SUPER};

/// What a shortcut does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Leave the event loop
    Quit,
    /// Cycle focus to the next client
    FocusNext,
    /// Kill the client owning the input focus
    KillFocused,
    /// Fill the monitor under the focused client's frame
    MaximizeFocused,
    /// Launch an external program
    Spawn { command: Vec<String> },
}

/// Key bindings indexed by keysym
#[derive(Debug, Clone, Default)]
pub struct KeyBindings {
    bindings: HashMap<Keysym, Action>,
}

impl KeyBindings {
    /// Resolve configured bindings, skipping unknown key names. A later entry
    /// for the same key replaces an earlier one.
    pub fn from_config(entries: &[KeyBindingConfig]) -> Self {
        let mut bindings = HashMap::new();

        for entry in entries {
            let Some(keysym) = keysym_from_name(&entry.key) else {
                warn!("Unknown key name {:?} in key binding, skipping", entry.key);
                continue;
            };
            if let Action::Spawn { command } = &entry.action {
                if command.is_empty() {
                    warn!("Key binding for {:?} has an empty command, skipping", entry.key);
                    continue;
                }
            }
            debug!("Binding Super+{} ({:#x}) to {:?}", entry.key, keysym, entry.action);
            bindings.insert(keysym, entry.action.clone());
        }

        Self { bindings }
    }

    /// Action for a key press, if `state` carries the Super modifier
    pub fn lookup(&self, keysym: Keysym, state: u16) -> Option<&Action> {
        if state & MOD_SUPER == 0 {
            return None;
        }
        self.bindings.get(&keysym)
    }

    /// Every bound keysym, for grabbing on the root
    pub fn keysyms(&self) -> Vec<Keysym> {
        let mut keysyms: Vec<Keysym> = self.bindings.keys().copied().collect();
        keysyms.sort_unstable();
        keysyms
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}

/// Keysym for a key name as written in the config file
pub fn keysym_from_name(name: &str) -> Option<Keysym> {
    let named = match name {
        "space" => Some(0x0020),
        "Tab" => Some(0xff09),
        "Return" => Some(0xff0d),
        "Escape" => Some(0xff1b),
        "BackSpace" => Some(0xff08),
        "Delete" => Some(0xffff),
        _ => None,
    };
    if named.is_some() {
        return named;
    }

    if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
        // XK_F1
        return (1..=12).contains(&n).then(|| 0xffbe + n - 1);
    }

    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        // Latin-1 keysyms equal the code point; letters bind by their lowercase form
        (Some(c), None) if c.is_ascii_graphic() => Some(c.to_ascii_lowercase() as Keysym),
        _ => None,
    }
}
