//! Default keyboard layout, served to clients as data

use serde::Serialize;

use super::variant::CombatConfig;

/// Logical input a key maps to. Mirrors the fields of `Buttons`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    MoveLeft,
    MoveRight,
    Jump,
    Light,
    Heavy,
    Special,
    Modifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyBinding {
    pub action: ControlAction,
    /// DOM `KeyboardEvent.code`
    pub key: &'static str,
}

/// Bindings for the attacks a variant actually has
pub fn default_bindings(config: &CombatConfig) -> Vec<KeyBinding> {
    let mut bindings = vec![
        KeyBinding {
            action: ControlAction::MoveLeft,
            key: "KeyA",
        },
        KeyBinding {
            action: ControlAction::MoveRight,
            key: "KeyD",
        },
        KeyBinding {
            action: ControlAction::Jump,
            key: "KeyW",
        },
    ];

    let optional = [
        (config.light.is_some(), ControlAction::Light, "KeyJ"),
        (config.heavy.is_some(), ControlAction::Heavy, "KeyK"),
        (config.special.is_some(), ControlAction::Special, "KeyL"),
        (
            config.modified_special.is_some(),
            ControlAction::Modifier,
            "Space",
        ),
    ];
    bindings.extend(
        optional
            .into_iter()
            .filter(|(available, _, _)| *available)
            .map(|(_, action, key)| KeyBinding { action, key }),
    );

    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::variant::Variant;

    fn actions(variant: Variant) -> Vec<ControlAction> {
        default_bindings(&CombatConfig::for_variant(variant))
            .into_iter()
            .map(|b| b.action)
            .collect()
    }

    #[test]
    fn ki_clash_has_kick_but_no_modifier() {
        let actions = actions(Variant::KiClash);
        assert!(actions.contains(&ControlAction::Heavy));
        assert!(!actions.contains(&ControlAction::Modifier));
    }

    #[test]
    fn z_battle_has_modifier_but_no_kick() {
        let actions = actions(Variant::ZBattle);
        assert!(!actions.contains(&ControlAction::Heavy));
        assert!(actions.contains(&ControlAction::Modifier));
        assert!(actions.contains(&ControlAction::Special));
    }

    #[test]
    fn bindings_serialize_as_snake_case() {
        let json = serde_json::to_value(KeyBinding {
            action: ControlAction::MoveLeft,
            key: "KeyA",
        })
        .unwrap();
        assert_eq!(json["action"], "move_left");
        assert_eq!(json["key"], "KeyA");
    }
}
