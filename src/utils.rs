//! Small helpers for code that runs on every rank.

use crate::message::Communicator;

/// `"Rank N:"` for the calling rank, or `None` on a group of one, where
/// there is nothing to tell apart.
pub fn rank_prefix<C: Communicator>(comm: &C) -> Option<String> {
    (comm.size() > 1).then(|| format!("Rank {}:", comm.rank()))
}

/// `message` with the rank prefix in front of it when the group has more
/// than one rank.
pub fn with_rank_prefix<C: Communicator>(comm: &C, message: &str) -> String {
    match rank_prefix(comm) {
        Some(prefix) => format!("{} {}", prefix, message),
        None => message.to_string(),
    }
}

/// Prints a line to standard output, prefixed with the rank when the group
/// has more than one rank.
pub fn rprint<C: Communicator>(comm: &C, message: &str) {
    println!("{}", with_rank_prefix(comm, message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{LocalCommunicator, NullCommunicator};

    #[test]
    fn single_rank_groups_have_no_prefix() {
        let comm = NullCommunicator::new();
        assert_eq!(rank_prefix(&comm), None);
        assert_eq!(with_rank_prefix(&comm, "ready"), "ready");
    }

    #[test]
    fn multi_rank_groups_name_the_rank() {
        let comms = LocalCommunicator::cluster(3);
        assert_eq!(rank_prefix(&comms[2]).as_deref(), Some("Rank 2:"));
        assert_eq!(with_rank_prefix(&comms[0], "ready"), "Rank 0: ready");
    }
}
