mod officer;

pub use officer::{Officer, OfficerLoad};
