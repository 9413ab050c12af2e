//! Application logic between the HTTP handlers and the store, gateway and
//! notifier.

pub mod checkin;
pub mod events;
pub mod orders;
pub mod payments;
pub mod qr;
pub mod reporting;
pub mod tickets;
