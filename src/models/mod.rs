pub mod event;
pub mod identity;
pub mod poll;
pub mod vote;

pub use event::*;
pub use identity::*;
pub use poll::*;
pub use vote::*;
