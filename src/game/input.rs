use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use winit::keyboard::KeyCode;

use super::player::ActionState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameAction {
    MoveForward,
    MoveBackward,
    StrafeLeft,
    StrafeRight,
    TurnLeft,
    TurnRight,
    FlyUp,
    FlyDown,
    LookUp,
    LookDown,
    Quit,
    ToggleLighting,
    ToggleTextInput,
}

impl GameAction {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MoveForward => "Move Forward",
            Self::MoveBackward => "Move Backward",
            Self::StrafeLeft => "Strafe Left",
            Self::StrafeRight => "Strafe Right",
            Self::TurnLeft => "Turn Left",
            Self::TurnRight => "Turn Right",
            Self::FlyUp => "Fly Up",
            Self::FlyDown => "Fly Down",
            Self::LookUp => "Look Up",
            Self::LookDown => "Look Down",
            Self::Quit => "Quit",
            Self::ToggleLighting => "Toggle Lighting",
            Self::ToggleTextInput => "Toggle Text Input",
        }
    }

    pub fn all() -> &'static [GameAction] {
        use GameAction::*;
        &[
            MoveForward, MoveBackward, StrafeLeft, StrafeRight,
            TurnLeft, TurnRight, FlyUp, FlyDown, LookUp, LookDown,
            Quit, ToggleLighting, ToggleTextInput,
        ]
    }

    /// Discrete actions fire once per press instead of being held.
    pub fn control_event(&self) -> Option<ControlEvent> {
        match self {
            Self::Quit => Some(ControlEvent::Quit),
            Self::ToggleLighting => Some(ControlEvent::ToggleLighting),
            Self::ToggleTextInput => Some(ControlEvent::ToggleTextInput),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    Quit,
    ToggleLighting,
    ToggleTextInput,
}

/// A physical key, stored in settings by its `KeyCode` name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyBind(pub KeyCode);

impl KeyBind {
    pub fn display_name(&self) -> String {
        format!("{:?}", self.0)
    }
}

impl Serialize for KeyBind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display_name())
    }
}

impl<'de> Deserialize<'de> for KeyBind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        keycode_from_str(&s)
            .map(KeyBind)
            .ok_or_else(|| serde::de::Error::custom(format!("Unknown key code: {s}")))
    }
}

fn keycode_from_str(s: &str) -> Option<KeyCode> {
    // Match the Debug output of KeyCode variants
    let code = match s {
        "KeyA" => KeyCode::KeyA,
        "KeyB" => KeyCode::KeyB,
        "KeyC" => KeyCode::KeyC,
        "KeyD" => KeyCode::KeyD,
        "KeyE" => KeyCode::KeyE,
        "KeyF" => KeyCode::KeyF,
        "KeyG" => KeyCode::KeyG,
        "KeyH" => KeyCode::KeyH,
        "KeyI" => KeyCode::KeyI,
        "KeyJ" => KeyCode::KeyJ,
        "KeyK" => KeyCode::KeyK,
        "KeyL" => KeyCode::KeyL,
        "KeyM" => KeyCode::KeyM,
        "KeyN" => KeyCode::KeyN,
        "KeyO" => KeyCode::KeyO,
        "KeyP" => KeyCode::KeyP,
        "KeyQ" => KeyCode::KeyQ,
        "KeyR" => KeyCode::KeyR,
        "KeyS" => KeyCode::KeyS,
        "KeyT" => KeyCode::KeyT,
        "KeyU" => KeyCode::KeyU,
        "KeyV" => KeyCode::KeyV,
        "KeyW" => KeyCode::KeyW,
        "KeyX" => KeyCode::KeyX,
        "KeyY" => KeyCode::KeyY,
        "KeyZ" => KeyCode::KeyZ,
        "Digit0" => KeyCode::Digit0,
        "Digit1" => KeyCode::Digit1,
        "Digit2" => KeyCode::Digit2,
        "Digit3" => KeyCode::Digit3,
        "Digit4" => KeyCode::Digit4,
        "Digit5" => KeyCode::Digit5,
        "Digit6" => KeyCode::Digit6,
        "Digit7" => KeyCode::Digit7,
        "Digit8" => KeyCode::Digit8,
        "Digit9" => KeyCode::Digit9,
        "Escape" => KeyCode::Escape,
        "Tab" => KeyCode::Tab,
        "Space" => KeyCode::Space,
        "Enter" => KeyCode::Enter,
        "Backspace" => KeyCode::Backspace,
        "ArrowUp" => KeyCode::ArrowUp,
        "ArrowDown" => KeyCode::ArrowDown,
        "ArrowLeft" => KeyCode::ArrowLeft,
        "ArrowRight" => KeyCode::ArrowRight,
        "PageUp" => KeyCode::PageUp,
        "PageDown" => KeyCode::PageDown,
        "Home" => KeyCode::Home,
        "End" => KeyCode::End,
        "Insert" => KeyCode::Insert,
        "Delete" => KeyCode::Delete,
        "Backquote" => KeyCode::Backquote,
        "ShiftLeft" => KeyCode::ShiftLeft,
        "ShiftRight" => KeyCode::ShiftRight,
        "ControlLeft" => KeyCode::ControlLeft,
        "ControlRight" => KeyCode::ControlRight,
        "AltLeft" => KeyCode::AltLeft,
        "AltRight" => KeyCode::AltRight,
        "F1" => KeyCode::F1,
        "F2" => KeyCode::F2,
        "F3" => KeyCode::F3,
        "F4" => KeyCode::F4,
        "F5" => KeyCode::F5,
        "F6" => KeyCode::F6,
        "F7" => KeyCode::F7,
        "F8" => KeyCode::F8,
        "F9" => KeyCode::F9,
        "F10" => KeyCode::F10,
        "F11" => KeyCode::F11,
        "F12" => KeyCode::F12,
        _ => return None,
    };
    Some(code)
}

pub type Bindings = HashMap<GameAction, Vec<KeyBind>>;

/// ESDF plus the arrow cluster.
pub fn default_bindings() -> Bindings {
    use GameAction::*;
    fn keys(codes: &[KeyCode]) -> Vec<KeyBind> {
        codes.iter().copied().map(KeyBind).collect()
    }
    HashMap::from([
        (MoveForward, keys(&[KeyCode::ArrowUp, KeyCode::KeyE])),
        (MoveBackward, keys(&[KeyCode::ArrowDown, KeyCode::KeyD])),
        (TurnLeft, keys(&[KeyCode::ArrowLeft, KeyCode::KeyS])),
        (TurnRight, keys(&[KeyCode::ArrowRight, KeyCode::KeyF])),
        (StrafeLeft, keys(&[KeyCode::KeyW])),
        (StrafeRight, keys(&[KeyCode::KeyR])),
        (LookUp, keys(&[KeyCode::PageUp])),
        (LookDown, keys(&[KeyCode::PageDown])),
        (FlyUp, keys(&[KeyCode::Home])),
        (FlyDown, keys(&[KeyCode::End])),
        (Quit, keys(&[KeyCode::Escape])),
        (ToggleLighting, keys(&[KeyCode::KeyL])),
        (ToggleTextInput, keys(&[KeyCode::Backquote])),
    ])
}

pub struct InputState {
    pub bindings: Bindings,
    reverse_map: HashMap<KeyCode, Vec<GameAction>>,
    held_keys: HashSet<KeyCode>,
    events: Vec<ControlEvent>,
}

impl InputState {
    pub fn new(bindings: Bindings) -> Self {
        let reverse_map = build_reverse_map(&bindings);
        Self {
            bindings,
            reverse_map,
            held_keys: HashSet::new(),
            events: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_defaults() -> Self {
        Self::new(default_bindings())
    }

    /// Feed one physical key transition. Auto-repeat presses do not
    /// retrigger discrete controls.
    pub fn on_key_event(&mut self, code: KeyCode, pressed: bool, repeat: bool) {
        if !pressed {
            self.held_keys.remove(&code);
            return;
        }
        self.held_keys.insert(code);
        if repeat {
            return;
        }
        if let Some(actions) = self.reverse_map.get(&code) {
            for action in actions {
                if let Some(event) = action.control_event() {
                    self.events.push(event);
                }
            }
        }
    }

    /// True while any key bound to `action` is down.
    pub fn is_active(&self, action: GameAction) -> bool {
        self.bindings
            .get(&action)
            .is_some_and(|keys| keys.iter().any(|k| self.held_keys.contains(&k.0)))
    }

    pub fn action_state(&self) -> ActionState {
        use GameAction::*;
        ActionState {
            up: self.is_active(MoveForward),
            down: self.is_active(MoveBackward),
            left: self.is_active(StrafeLeft),
            right: self.is_active(StrafeRight),
            turn_left: self.is_active(TurnLeft),
            turn_right: self.is_active(TurnRight),
            fly_up: self.is_active(FlyUp),
            fly_down: self.is_active(FlyDown),
            look_up: self.is_active(LookUp),
            look_down: self.is_active(LookDown),
        }
    }

    pub fn take_events(&mut self) -> Vec<ControlEvent> {
        std::mem::take(&mut self.events)
    }

    /// Forget held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.held_keys.clear();
    }

    #[cfg(test)]
    pub fn rebind(&mut self, action: GameAction, keys: Vec<KeyBind>) {
        self.bindings.insert(action, keys);
        self.reverse_map = build_reverse_map(&self.bindings);
    }
}

fn build_reverse_map(bindings: &Bindings) -> HashMap<KeyCode, Vec<GameAction>> {
    let mut map: HashMap<KeyCode, Vec<GameAction>> = HashMap::new();
    for (&action, keys) in bindings {
        for key in keys {
            map.entry(key.0).or_default().push(action);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings_cover_all_actions() {
        let bindings = default_bindings();
        for action in GameAction::all() {
            assert!(bindings.contains_key(action), "{} unbound", action.display_name());
        }
    }

    #[test]
    fn test_either_key_drives_action() {
        let mut state = InputState::with_defaults();
        state.on_key_event(KeyCode::KeyE, true, false);
        assert!(state.action_state().up);
        state.on_key_event(KeyCode::ArrowUp, true, false);
        state.on_key_event(KeyCode::KeyE, false, false);
        assert!(state.action_state().up);
        state.on_key_event(KeyCode::ArrowUp, false, false);
        assert!(!state.action_state().any());
    }

    #[test]
    fn test_esdf_layout() {
        let mut state = InputState::with_defaults();
        for code in [KeyCode::KeyS, KeyCode::KeyF, KeyCode::KeyW, KeyCode::KeyR] {
            state.on_key_event(code, true, false);
        }
        let act = state.action_state();
        assert!(act.turn_left && act.turn_right && act.left && act.right);
        assert!(!act.up && !act.down);
    }

    #[test]
    fn test_control_events_fire_once() {
        let mut state = InputState::with_defaults();
        state.on_key_event(KeyCode::KeyL, true, false);
        state.on_key_event(KeyCode::KeyL, true, true);
        state.on_key_event(KeyCode::Escape, true, false);
        assert_eq!(
            state.take_events(),
            vec![ControlEvent::ToggleLighting, ControlEvent::Quit]
        );
        assert!(state.take_events().is_empty());
        // controls are not movement
        assert!(!state.action_state().any());
    }

    #[test]
    fn test_rebinding() {
        let mut state = InputState::with_defaults();
        state.rebind(GameAction::MoveForward, vec![KeyBind(KeyCode::KeyI)]);

        state.on_key_event(KeyCode::KeyE, true, false);
        assert!(!state.is_active(GameAction::MoveForward));

        state.on_key_event(KeyCode::KeyI, true, false);
        assert!(state.is_active(GameAction::MoveForward));
    }

    #[test]
    fn test_release_all() {
        let mut state = InputState::with_defaults();
        state.on_key_event(KeyCode::PageUp, true, false);
        assert!(state.action_state().look_up);
        state.release_all();
        assert!(!state.action_state().look_up);
    }

    #[test]
    fn test_keybind_serialization() {
        // Wrap in a HashMap since TOML requires top-level tables
        let mut map = HashMap::new();
        map.insert("key", vec![KeyBind(KeyCode::PageUp), KeyBind(KeyCode::Backquote)]);
        let s = toml::to_string(&map).unwrap();
        assert!(s.contains("PageUp"));
        let back: HashMap<String, Vec<KeyBind>> = toml::from_str(&s).unwrap();
        assert_eq!(back["key"][1], KeyBind(KeyCode::Backquote));

        let bad: Result<HashMap<String, KeyBind>, _> = toml::from_str("key = \"Hyper\"");
        assert!(bad.is_err());
    }
}
