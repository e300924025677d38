//! Line classification.
//!
//! Every rule pairs a predicate with an extractor. Rules are tried in
//! [`RULES`] order and the first predicate that holds decides the line, so
//! the more specific markers sit above the generic "mentions the player"
//! ones.

use crate::error::ParseError;
use crate::session::SessionState;

pub const GAME_MODE_MARKER: &str = "<Context Establisher Done>";
pub const LOGIN_MARKER: &str = "<Legacy login response> [CIG-net] User Login Success";
pub const CHARACTER_STATUS_MARKER: &str = "AccountLoginCharacterStatus_Character";
pub const VEHICLE_SPAWN_MARKER: &str = "CPlayerShipRespawnManager::OnVehicleSpawned";
pub const VEHICLE_DESTRUCTION_MARKER: &str = "<Vehicle Destruction>";
pub const CONTROL_DEAD_MARKER: &str = "<local client>: Entering control state dead";
pub const ZONE_ENTER_MARKER: &str = "OnEntityEnterZone";
pub const ZONE_DELIMITER: &str = "-> Entity ";
pub const KILL_MARKER: &str = "CActor::Kill:";

const HANDLE_PREFIX: &str = "Handle[";

const GAME_MODE_TOKEN: usize = 8;
const GEID_TOKEN: usize = 11;
const VEHICLE_TOKEN: usize = 5;

/// NPC and AI actors whose kill lines are noise.
pub const IGNORED_KILL_SUBSTRINGS: &[&str] =
    &["PU_Pilots", "NPC_Archetypes", "PU_Human", "kopion", "marok"];

/// Zone names starting with one of these are player vehicles.
pub const MANUFACTURER_PREFIXES: &[&str] = &[
    "DRAK", "ORIG", "AEGS", "ANVL", "CRUS", "BANU", "MISC", "KRIG", "XNAA", "ARGO", "VNCL", "ESPR",
    "RSI", "CNOU", "GRIN", "TMBL", "GAMA",
];

/// A vehicle zone the player entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEntry {
    pub kind: String,
    pub instance_id: String,
}

/// What a single log line means to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    PlayerIdentified { handle: String },
    CharacterIdentified { geid: String },
    GameModeChanged { mode: String },
    VehicleEntered { kind: String, instance_id: String },
    VehicleDestroyed,
    /// `None` when the zone line carries no entity delimiter.
    ZoneEntered(Option<ZoneEntry>),
    KillLine(String),
    Unrecognized,
}

type Predicate = fn(&str, &SessionState) -> bool;
type Extractor = fn(&str, &SessionState) -> Result<ClassifiedEvent, ParseError>;

/// One classification rule.
pub struct Rule {
    pub name: &'static str,
    pub applies: Predicate,
    pub extract: Extractor,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// Classification rules, highest precedence first.
pub static RULES: &[Rule] = &[
    Rule {
        name: "game_mode",
        applies: |line, _| line.contains(GAME_MODE_MARKER),
        extract: extract_game_mode,
    },
    Rule {
        name: "login",
        applies: |line, _| line.contains(LOGIN_MARKER),
        extract: extract_handle,
    },
    Rule {
        name: "character_status",
        applies: |line, _| line.contains(CHARACTER_STATUS_MARKER),
        extract: extract_geid,
    },
    Rule {
        name: "vehicle_spawn",
        applies: applies_vehicle_spawn,
        extract: extract_vehicle_spawn,
    },
    Rule {
        name: "vehicle_destroyed",
        applies: applies_vehicle_destroyed,
        extract: |_, _| Ok(ClassifiedEvent::VehicleDestroyed),
    },
    Rule {
        name: "zone_entry",
        applies: applies_zone_entry,
        extract: extract_zone_entry,
    },
    Rule {
        name: "kill",
        applies: applies_kill,
        extract: |line, _| Ok(ClassifiedEvent::KillLine(line.to_string())),
    },
];

/// Classifies one line against the current session.
///
/// Lines no rule claims are [`ClassifiedEvent::Unrecognized`]. A claimed line
/// whose fields cannot be extracted is a [`ParseError`] for that line only.
pub fn classify(line: &str, state: &SessionState) -> Result<ClassifiedEvent, ParseError> {
    let line = trim_line(line);
    match matching_rule(line, state) {
        Some(rule) => (rule.extract)(line, state),
        None => Ok(ClassifiedEvent::Unrecognized),
    }
}

/// Returns the first rule whose predicate holds for `line`.
pub fn matching_rule(line: &str, state: &SessionState) -> Option<&'static Rule> {
    let line = trim_line(line);
    RULES.iter().find(|rule| (rule.applies)(line, state))
}

fn trim_line(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Returns the token at `index` after splitting on single spaces.
///
/// The log producer pads nothing, so empty tokens are kept to preserve
/// positions.
pub(crate) fn token(line: &str, index: usize) -> Result<&str, ParseError> {
    let mut found = 0;
    for (i, tok) in line.split(' ').enumerate() {
        if i == index {
            return Ok(tok);
        }
        found = i + 1;
    }
    Err(ParseError::MissingToken { index, found })
}

/// Strips one wrapping quote or bracket from each end.
fn strip_wrapping(token: &str) -> &str {
    let token = token.strip_prefix(['\'', '"', '[', '<']).unwrap_or(token);
    token.strip_suffix(['\'', '"', ']', '>']).unwrap_or(token)
}

fn mentions_player(line: &str, state: &SessionState) -> bool {
    state
        .player_handle()
        .is_some_and(|handle| !handle.is_empty() && line.contains(handle))
}

fn extract_game_mode(line: &str, _: &SessionState) -> Result<ClassifiedEvent, ParseError> {
    let field = token(line, GAME_MODE_TOKEN)?;
    let (_, value) = field
        .split_once('=')
        .ok_or(ParseError::MissingDelimiter("="))?;
    let mode = value.trim_matches('"');
    if mode.is_empty() {
        return Err(ParseError::Malformed(format!("empty game mode in {field:?}")));
    }
    Ok(ClassifiedEvent::GameModeChanged {
        mode: mode.to_string(),
    })
}

fn extract_handle(line: &str, _: &SessionState) -> Result<ClassifiedEvent, ParseError> {
    let handle = parse_login_handle(line)?;
    Ok(ClassifiedEvent::PlayerIdentified {
        handle: handle.to_string(),
    })
}

/// Pulls the handle out of a login-success line.
pub(crate) fn parse_login_handle(line: &str) -> Result<&str, ParseError> {
    let start = line
        .find(HANDLE_PREFIX)
        .ok_or(ParseError::MissingDelimiter(HANDLE_PREFIX))?
        + HANDLE_PREFIX.len();
    let rest = &line[start..];
    let end = rest.find(']').ok_or(ParseError::MissingDelimiter("]"))?;
    let handle = rest[..end].trim();
    if handle.is_empty() {
        return Err(ParseError::Malformed("empty handle".into()));
    }
    Ok(handle)
}

fn extract_geid(line: &str, _: &SessionState) -> Result<ClassifiedEvent, ParseError> {
    let geid = token(line, GEID_TOKEN)?.trim();
    if geid.is_empty() {
        return Err(ParseError::Malformed("empty character id".into()));
    }
    Ok(ClassifiedEvent::CharacterIdentified {
        geid: geid.to_string(),
    })
}

fn applies_vehicle_spawn(line: &str, state: &SessionState) -> bool {
    line.contains(VEHICLE_SPAWN_MARKER)
        && !state.is_default_mode()
        && state
            .player_geid()
            .is_some_and(|geid| !geid.is_empty() && line.contains(geid))
}

fn extract_vehicle_spawn(line: &str, _: &SessionState) -> Result<ClassifiedEvent, ParseError> {
    let vehicle = strip_wrapping(token(line, VEHICLE_TOKEN)?);
    if vehicle.is_empty() {
        return Err(ParseError::Malformed("empty vehicle name".into()));
    }
    // Spawn names usually end in `_<instance id>`; otherwise the whole name
    // identifies the instance.
    let (kind, instance_id) = match vehicle.rsplit_once('_') {
        Some((kind, id))
            if !kind.is_empty() && !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) =>
        {
            (kind, id)
        }
        _ => (vehicle, vehicle),
    };
    Ok(ClassifiedEvent::VehicleEntered {
        kind: kind.to_string(),
        instance_id: instance_id.to_string(),
    })
}

fn applies_vehicle_destroyed(line: &str, state: &SessionState) -> bool {
    (line.contains(VEHICLE_DESTRUCTION_MARKER) || line.contains(CONTROL_DEAD_MARKER))
        && state
            .active_vehicle()
            .instance_id()
            .is_some_and(|id| line.contains(id))
}

fn applies_zone_entry(line: &str, state: &SessionState) -> bool {
    mentions_player(line, state)
        && (line.contains(ZONE_ENTER_MARKER) || line.contains(ZONE_DELIMITER))
}

fn extract_zone_entry(line: &str, _: &SessionState) -> Result<ClassifiedEvent, ParseError> {
    let Some(start) = line.find(ZONE_DELIMITER) else {
        return Ok(ClassifiedEvent::ZoneEntered(None));
    };
    let rest = &line[start + ZONE_DELIMITER.len()..];
    let zone = strip_wrapping(rest.split(' ').next().unwrap_or_default());
    if !MANUFACTURER_PREFIXES.iter().any(|p| zone.starts_with(p)) {
        return Ok(ClassifiedEvent::Unrecognized);
    }
    let (kind, instance_id) = zone
        .rsplit_once('_')
        .ok_or_else(|| ParseError::Malformed(format!("zone without instance id: {zone}")))?;
    Ok(ClassifiedEvent::ZoneEntered(Some(ZoneEntry {
        kind: kind.to_string(),
        instance_id: instance_id.to_string(),
    })))
}

fn applies_kill(line: &str, state: &SessionState) -> bool {
    mentions_player(line, state) && line.contains(KILL_MARKER) && !is_ignored_kill(line)
}

/// Whether a kill line involves an NPC actor (case-insensitive).
pub fn is_ignored_kill(line: &str) -> bool {
    let lower = line.to_lowercase();
    IGNORED_KILL_SUBSTRINGS
        .iter()
        .any(|s| lower.contains(&s.to_lowercase()))
}
