//! Log line builders shared by unit tests.

pub(crate) const GEID: &str = "200146295176";

pub(crate) fn login(handle: &str) -> String {
    format!(
        "<2025-01-01T11:59:00.000Z> [Notice] <Legacy login response> [CIG-net] User Login Success - Handle[{handle}] - Time[1234]"
    )
}

pub(crate) fn character(geid: &str) -> String {
    format!(
        "<2025-01-01T11:59:01.000Z> [Notice] <AccountLoginCharacterStatus_Character> Character: createdAt 1700000000 - updatedAt 1700000001 - geid {geid} - accountId 123"
    )
}

pub(crate) fn game_mode(mode: &str) -> String {
    format!(
        "<2025-01-01T12:00:00.000Z> [Notice] <Context Establisher Done> establisher=\"Network\" message=\"\" runningTime=12.5 gamerules=\"{mode}\" map=\"megamap\" sessionId=\"abc\""
    )
}

pub(crate) fn spawn(vehicle: &str, geid: &str) -> String {
    format!(
        "<2025-01-01T12:00:05.000Z> [Notice] <Vehicle Spawned> CPlayerShipRespawnManager::OnVehicleSpawned: '{vehicle}' for player {geid} [Team_Game]"
    )
}

pub(crate) fn zone_entry(handle: &str, zone: &str) -> String {
    format!(
        "<2025-01-01T12:00:06.000Z> [Notice] <OnEntityEnterZone> Entity [{handle}] [200] -> Entity [{zone}] [1]"
    )
}

pub(crate) fn destruction(instance_id: &str) -> String {
    format!(
        "<2025-01-01T12:00:09.000Z> [Notice] <Vehicle Destruction> CVehicle::OnAdvanceDestroyLevel: Vehicle 'ship_{instance_id}' [{instance_id}] destroyed"
    )
}

pub(crate) fn kill(victim: &str, zone: &str, killer: &str, weapon: &str) -> String {
    format!(
        "<2025-01-01T12:01:00.000Z> [Notice] <Actor Death> CActor::Kill: '{victim}' [123] in zone '{zone}' killed by '{killer}' [456] using '{weapon}' [Class unknown] with damage type 'Bullet'"
    )
}

/// Login, character and a non-default mode for `handle`.
pub(crate) fn session_start(handle: &str) -> Vec<String> {
    vec![login(handle), character(GEID), game_mode("EA_Elimination")]
}
