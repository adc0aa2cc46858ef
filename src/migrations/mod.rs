mod m0001_videos;
mod m0002_upload_state;

use cetane::prelude::MigrationRegistry;

pub fn registry() -> MigrationRegistry {
    let mut reg = MigrationRegistry::new();
    reg.register(m0001_videos::migration());
    reg.register(m0002_upload_state::migration());
    reg
}
