//! Public south-bound API.
//!
//! Thin forwarding methods on [`Redirector`](crate::Redirector) addressed by
//! ASIC unit. These are the entry points the REST and CLI layers call.

mod bst;
mod system;
