//! Animation clip table and per-character animation state
//!
//! Clips are opaque handles for the client renderer. The server only needs
//! their lengths: attack, hit-reaction and effect timers run for exactly one
//! playthrough of the matching clip.

use serde::{Deserialize, Serialize};

/// Animation a character is currently playing. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationState {
    Idle,
    Walk,
    Punch,
    Kick,
    Hit,
    KnockedDown,
}

/// A spritesheet animation clip
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnimationClip {
    pub key: &'static str,
    pub sheet: &'static str,
    pub start_frame: u32,
    pub end_frame: u32,
    pub frame_rate: f32,
    /// `true` loops forever; `false` plays once and holds the last frame
    pub repeat: bool,
}

impl AnimationClip {
    pub fn frame_count(&self) -> u32 {
        self.end_frame.saturating_sub(self.start_frame) + 1
    }

    /// Length of one playthrough in seconds
    pub fn duration(&self) -> f32 {
        if self.frame_rate <= 0.0 {
            return 0.0;
        }
        self.frame_count() as f32 / self.frame_rate
    }
}

/// Character body frames shared by every fighter sheet
const fn body_clip(
    key: &'static str,
    sheet: &'static str,
    state: AnimationState,
) -> AnimationClip {
    let (start_frame, end_frame, frame_rate, repeat) = match state {
        AnimationState::Idle => (0, 0, 1.0, true),
        AnimationState::Walk => (1, 5, 10.0, true),
        AnimationState::Punch => (6, 10, 15.0, false),
        AnimationState::Kick => (11, 15, 15.0, false),
        AnimationState::Hit => (16, 18, 10.0, false),
        AnimationState::KnockedDown => (19, 22, 8.0, false),
    };
    AnimationClip {
        key,
        sheet,
        start_frame,
        end_frame,
        frame_rate,
        repeat,
    }
}

/// Clip set for one fighter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FighterClips {
    pub idle: AnimationClip,
    pub walk: AnimationClip,
    pub punch: AnimationClip,
    pub kick: AnimationClip,
    pub hurt: AnimationClip,
    pub knocked_down: AnimationClip,
}

impl FighterClips {
    pub fn clip(&self, state: AnimationState) -> &AnimationClip {
        match state {
            AnimationState::Idle => &self.idle,
            AnimationState::Walk => &self.walk,
            AnimationState::Punch => &self.punch,
            AnimationState::Kick => &self.kick,
            AnimationState::Hit => &self.hurt,
            AnimationState::KnockedDown => &self.knocked_down,
        }
    }
}

macro_rules! fighter_clips {
    ($prefix:literal, $sheet:literal) => {
        FighterClips {
            idle: body_clip(concat!($prefix, "_idle"), $sheet, AnimationState::Idle),
            walk: body_clip(concat!($prefix, "_walk"), $sheet, AnimationState::Walk),
            punch: body_clip(concat!($prefix, "_punch"), $sheet, AnimationState::Punch),
            kick: body_clip(concat!($prefix, "_kick"), $sheet, AnimationState::Kick),
            hurt: body_clip(concat!($prefix, "_hurt"), $sheet, AnimationState::Hit),
            knocked_down: body_clip(
                concat!($prefix, "_knocked_down"),
                $sheet,
                AnimationState::KnockedDown,
            ),
        }
    };
}

pub const GOKU_SSJ: FighterClips = fighter_clips!("goku", "goku_ssj");
pub const VEGETA_SSJ: FighterClips = fighter_clips!("vegeta", "vegeta_ssj");
pub const GOKU_SSJ_SHEET: FighterClips = fighter_clips!("goku", "goku_ssj_spritesheet");
pub const VEGETA_SHEET: FighterClips = fighter_clips!("vegeta", "vegeta_spritesheet");

/// Transient effect clips
pub const HIT_IMPACT: AnimationClip = AnimationClip {
    key: "hit_impact",
    sheet: "hit_impact_fx",
    start_frame: 0,
    end_frame: 5,
    frame_rate: 20.0,
    repeat: false,
};

pub const KAMEHAMEHA: AnimationClip = AnimationClip {
    key: "kamehameha_fx_anim",
    sheet: "kamehameha_fx",
    start_frame: 0,
    end_frame: 3,
    frame_rate: 12.0,
    repeat: true,
};

pub const GALICK_GUN: AnimationClip = AnimationClip {
    key: "galick_gun_fx_anim",
    sheet: "galick_gun_fx",
    start_frame: 0,
    end_frame: 0,
    frame_rate: 1.0,
    repeat: true,
};

pub const SPIRIT_BOMB: AnimationClip = AnimationClip {
    key: "spirit_bomb_fx_anim",
    sheet: "spirit_bomb_fx",
    start_frame: 0,
    end_frame: 7,
    frame_rate: 12.0,
    repeat: false,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punch_lasts_five_frames_at_fifteen_fps() {
        let punch = GOKU_SSJ.clip(AnimationState::Punch);
        assert_eq!(punch.key, "goku_punch");
        assert_eq!(punch.frame_count(), 5);
        assert!((punch.duration() - 1.0 / 3.0).abs() < 1e-5);
        assert!(!punch.repeat);
    }

    #[test]
    fn sheets_are_distinct_per_fighter() {
        assert_eq!(VEGETA_SSJ.walk.sheet, "vegeta_ssj");
        assert_eq!(VEGETA_SHEET.walk.sheet, "vegeta_spritesheet");
        assert_eq!(VEGETA_SHEET.walk.key, "vegeta_walk");
        assert_eq!(GOKU_SSJ_SHEET.knocked_down.key, "goku_knocked_down");
    }

    #[test]
    fn zero_rate_clip_has_no_duration() {
        let clip = AnimationClip {
            frame_rate: 0.0,
            ..HIT_IMPACT
        };
        assert_eq!(clip.duration(), 0.0);
    }
}
