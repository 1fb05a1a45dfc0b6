pub mod html;
pub mod seat_map;

pub use seat_map::{CellView, ClickOutcome, SeatDisplay, SeatMapView, ViewTransform};
