//! View models for the staff and task screens.
//!
//! Each screen keeps its raw data, a [`ListState`](crate::query::ListState) and the actions
//! that call the API and refetch.

mod desk;
mod staff;
mod tasks;

pub use desk::*;
pub use staff::*;
pub use tasks::*;
