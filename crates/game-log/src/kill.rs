//! Kill line categorisation.

use killtrack_protocol::{AnonymizeState, CLIENT_VERSION, KillReport, citizen_profile_url};

use crate::error::ParseError;
use crate::matcher::token;
use crate::session::SessionState;

/// Modes where crashes and self-destructs are environment resets.
pub const EXCLUDED_MODES: &[&str] = &["EA_FreeFlight", "EA_SquadronBattle"];

/// Damage markers that are not real kills in an excluded mode.
pub const EXCLUSION_MARKERS: &[&str] = &["Crash", "SelfDestruct"];

/// Killer name the game uses for ship resets.
const UNKNOWN_KILLER: &str = "unknown";

const TIME_TOKEN: usize = 0;
const VICTIM_TOKEN: usize = 5;
const ZONE_TOKEN: usize = 9;
const KILLER_TOKEN: usize = 12;
const WEAPON_TOKEN: usize = 15;

/// Outcome of a kill line.
#[derive(Debug, Clone, PartialEq)]
pub enum KillResult {
    /// Crash or self-destruct in an excluded mode.
    Exclusion,
    /// Killed by `unknown`; a ship reset.
    Reset,
    /// Victim killed themselves.
    Suicide { victim: String, zone: String },
    /// The tracked player died.
    Killed {
        killer: String,
        weapon: String,
        zone: String,
    },
    /// The tracked player killed someone else.
    Killer(KillReport),
    /// Neither side is the tracked player; the handle only appears inside
    /// another name.
    Bystander { victim: String, killer: String },
}

impl KillResult {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Exclusion => "exclusion",
            Self::Reset => "reset",
            Self::Suicide { .. } => "suicide",
            Self::Killed { .. } => "killed",
            Self::Killer(_) => "killer",
            Self::Bystander { .. } => "bystander",
        }
    }
}

/// Fields of a kill line, quotes stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillFields<'a> {
    pub time: &'a str,
    pub victim: &'a str,
    pub zone: &'a str,
    pub killer: &'a str,
    pub weapon: &'a str,
}

impl<'a> KillFields<'a> {
    pub fn parse(line: &'a str) -> Result<Self, ParseError> {
        let field = |index| token(line, index).map(|t| t.trim_matches('\''));
        Ok(Self {
            time: field(TIME_TOKEN)?,
            victim: field(VICTIM_TOKEN)?,
            zone: field(ZONE_TOKEN)?,
            killer: field(KILLER_TOKEN)?,
            weapon: field(WEAPON_TOKEN)?,
        })
    }
}

/// Categorises a kill line for `handle` against the session as it is now.
///
/// Precedence: exclusion, suicide, reset, killed, killer. A line naming the
/// tracked player as both victim and killer is a suicide. Only a line whose
/// killer is exactly `handle` is the player's kill.
pub fn parse_kill(
    line: &str,
    handle: &str,
    state: &SessionState,
    anonymize: bool,
) -> Result<KillResult, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);

    if EXCLUDED_MODES.contains(&state.game_mode())
        && EXCLUSION_MARKERS.iter().any(|m| line.contains(m))
    {
        return Ok(KillResult::Exclusion);
    }

    let fields = KillFields::parse(line)?;

    if fields.victim == fields.killer {
        return Ok(KillResult::Suicide {
            victim: fields.victim.to_string(),
            zone: fields.zone.to_string(),
        });
    }
    if fields.killer.eq_ignore_ascii_case(UNKNOWN_KILLER) {
        return Ok(KillResult::Reset);
    }
    if fields.victim == handle {
        return Ok(KillResult::Killed {
            killer: fields.killer.to_string(),
            weapon: fields.weapon.to_string(),
            zone: fields.zone.to_string(),
        });
    }
    if fields.killer != handle {
        return Ok(KillResult::Bystander {
            victim: fields.victim.to_string(),
            killer: fields.killer.to_string(),
        });
    }

    Ok(KillResult::Killer(KillReport {
        player: handle.to_string(),
        victim: fields.victim.to_string(),
        time: fields.time.to_string(),
        zone: fields.zone.to_string(),
        weapon: fields.weapon.to_string(),
        rsi_profile: citizen_profile_url(fields.victim),
        game_mode: state.game_mode().to_string(),
        client_ver: CLIENT_VERSION.to_string(),
        killers_ship: state.active_vehicle().label().to_string(),
        anonymize_state: AnonymizeState { enabled: anonymize },
    }))
}
