mod scheduler;
mod shutdown;

pub use scheduler::RefreshScheduler;
#[cfg(test)]
pub use scheduler::TickOutcome;
pub use shutdown::Releasers;
