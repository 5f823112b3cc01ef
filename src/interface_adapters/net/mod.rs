// Network adapter modules split by session sockets, room HTTP routes, and UDP broadcast.

pub mod broadcast;
pub mod rooms;
pub mod session;

pub use broadcast::{BroadcastSettings, BroadcastStats, UdpSyncService};
pub use rooms::{create_room_handler, get_room_handler, list_rooms_handler, open_room};
pub use session::{spawn_room_serializer, ws_handler};
