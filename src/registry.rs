//! One facade per communicator handle, process wide.

use crate::buffer_comm::BufferComm;
use crate::error::{Error, Result};
use crate::message::{CommId, Communicator};
use log::{debug, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::Arc;

type Facades = HashMap<CommId, Arc<dyn Any + Send + Sync>>;

static FACADES: Lazy<Mutex<Facades>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Something [`get_or_create_facade`] accepts: a communicator handle, or a
/// facade that already wraps one.
pub trait Wrap {
    type Comm: Communicator;

    fn into_facade(self) -> Result<Arc<BufferComm<Self::Comm>>>;
}

impl<C> Wrap for C
where
    C: Communicator + Send + Sync + 'static,
{
    type Comm = C;

    fn into_facade(self) -> Result<Arc<BufferComm<C>>> {
        let (rank, size) = (self.rank(), self.size());
        if size == 0 || rank >= size {
            warn!("refusing to wrap a handle claiming rank {} of {}", rank, size);
            return Err(Error::InvalidArgument(format!(
                "not a valid communicator: rank {rank} of {size}"
            )));
        }
        let id = self.id();

        // Held across creation so concurrent callers agree on one facade.
        let mut facades = FACADES.lock();
        if let Some(existing) = facades.get(&id) {
            return existing.clone().downcast::<BufferComm<C>>().map_err(|_| {
                Error::InvalidArgument(format!(
                    "communicator {} is already wrapped as a different type than {}",
                    id.raw(),
                    type_name::<C>()
                ))
            });
        }
        let facade = Arc::new(BufferComm::new(self));
        facades.insert(id, facade.clone() as Arc<dyn Any + Send + Sync>);
        debug!("registered facade for communicator {} ({} in total)", id.raw(), facades.len());
        Ok(facade)
    }
}

impl<C: Communicator> Wrap for Arc<BufferComm<C>> {
    type Comm = C;

    fn into_facade(self) -> Result<Arc<BufferComm<C>>> {
        Ok(self)
    }
}

/// Returns the facade for `handle`, creating it on first use.
///
/// Wrapping the same handle again (or a clone of it, which shares its
/// [`CommId`]) returns the same facade, and passing a facade back in returns
/// it unchanged.
pub fn get_or_create_facade<W: Wrap>(handle: W) -> Result<Arc<BufferComm<W::Comm>>> {
    handle.into_facade()
}
