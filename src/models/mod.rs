pub mod seat;
pub mod user;
pub mod reservation;

pub use seat::{InvalidSeatCode, SeatCode, SeatRecord, SeatStatus};
pub use user::{AuthResponse, AuthUser, UserInfo};
pub use reservation::{SeatReservation, TicketPrices, UserReservation};
