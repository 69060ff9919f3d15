//! Plumbing shared by the race futures of this crate.

mod attempt;
mod contest;

pub(crate) use attempt::Attempt;
pub(crate) use contest::{Contest, Event};
