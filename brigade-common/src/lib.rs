pub mod api;
pub mod logging;
pub mod store;
pub mod types;

pub use api::{ApiReply, IngestRequest, LoginReply, LoginRequest, UserProfile};
pub use store::{PositionStore, SharedStore, StoreConfig, StoreError};
pub use types::{LatLng, LiveMessage, LivePosition, PointUpdate, PositionRecord, UnitMeta, now_millis};
