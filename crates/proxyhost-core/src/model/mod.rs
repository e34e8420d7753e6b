// ── Domain model ──
//
// Configuration records, identities and the views the engines publish.

mod id;
mod instance;
mod profile;
mod state;

pub use id::{InstanceId, ProfileId};
pub use instance::{ConnectionParams, InstanceConfig};
pub use profile::{
    DEFAULT_API_SERVER_PORT, DEFAULT_HTTP_PROXY_PORT, DEFAULT_SOCKS5_PROXY_PORT, Profile,
    ProfileParams, ProfileSet,
};
pub use state::{EngineStatus, InstanceStatus, Outcome, ProfileState, ReconciledState};
