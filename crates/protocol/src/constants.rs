/// Client version string the report service expects in every payload.
pub const CLIENT_VERSION: &str = "7.0";

/// Mode tag attached to heartbeats.
pub const COMMANDER_MODE: &str = "commander";

/// Endpoint receiving kill reports.
pub const REPORT_KILL_PATH: &str = "/reportKill";

/// Endpoint receiving key validation requests and heartbeats.
pub const VALIDATE_KEY_PATH: &str = "/validateKey";

const CITIZEN_PROFILE_PREFIX: &str = "https://robertsspaceindustries.com/citizens/";

/// Public profile URL for a player handle.
pub fn citizen_profile_url(handle: &str) -> String {
    format!("{CITIZEN_PROFILE_PREFIX}{handle}")
}
