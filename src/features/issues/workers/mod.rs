mod priority_refresher;

pub use priority_refresher::PriorityRefresher;
