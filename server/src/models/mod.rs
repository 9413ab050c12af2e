pub mod event;
pub mod order;
pub mod stats;
pub mod ticket;

pub use event::{Event, NewEvent};
pub use order::{CompletedOrder, NewOrder, Order, OrderCompletion, PaymentStatus, Transition};
pub use stats::{EventStats, OrderSummary};
pub use ticket::{CheckInOutcome, IssuedTicket, NewTicket, Ticket, TicketDetails};
