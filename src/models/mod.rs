pub mod player;
pub mod room;

pub use player::{Direction, Player, PlayerLocation};
pub use room::{
    CreateRoomRequest, CreateRoomResponse, DeleteRoomRequest, JoinRequest, JoinResponse,
    RoomListResponse, RoomListing, UpdateRoomRequest,
};
