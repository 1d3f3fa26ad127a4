mod control_ws;
mod handlers;
mod routes;
mod static_files;
mod video_ws;

pub use control_ws::control_ws_handler;
pub use routes::create_router;
pub use static_files::StaticAssets;
pub use video_ws::video_ws_handler;
