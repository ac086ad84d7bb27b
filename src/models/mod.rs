//! Data models for the circulation server

pub mod fine;
pub mod item;
pub mod loan;
pub mod member;

// Re-export commonly used types
pub use fine::{Fine, NewFine};
pub use item::{Item, ItemStatus};
pub use loan::{Loan, LoanStatus, NewLoan};
pub use member::{Member, MemberStatus};
