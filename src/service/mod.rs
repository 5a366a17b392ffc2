pub mod ambient;
pub mod prompt_relay;
pub mod session_acquirer;

pub use ambient::ContainerAmbient;
pub use prompt_relay::PromptRelay;
pub use session_acquirer::{
    AcquiredSession, AmbientSessions, SessionAcquirer, SessionBuilder, SessionSource,
    WarehouseSession,
};
