pub mod cortex_api;
pub mod keypair;
pub mod sql_api;

pub use cortex_api::{ChatResponse, CortexClient, FragmentStream};
pub use sql_api::{SqlApiAuth, SqlApiBuilder, SqlApiSession, StatementContext};
