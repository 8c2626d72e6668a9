use buffercomm::{get_or_create_facade, BufferComm, Config, LocalCommunicator};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub type Facade = Arc<BufferComm<LocalCommunicator>>;

/// Limits for cluster tests: a protocol bug fails the test instead of
/// hanging it.
pub fn config() -> Config {
    Config::default().with_recv_timeout(Duration::from_secs(10))
}

/// Runs `f` on every rank of a fresh in-process group, one thread per rank,
/// and returns the results in rank order.
pub fn run<F, R>(size: usize, config: Config, f: F) -> Vec<R>
where
    F: Fn(Facade) -> R + Send + Sync + 'static,
    R: Send + 'static,
{
    let f = Arc::new(f);
    let handles: Vec<_> = LocalCommunicator::cluster_with_config(size, config)
        .into_iter()
        .map(|comm| {
            let f = f.clone();
            thread::spawn(move || f(get_or_create_facade(comm).unwrap()))
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}
