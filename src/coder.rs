use crate::message::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// An object that can encode a particular type to, and decode it from, a
/// `Vec<u8>`. The generic path of every communicator goes through one of
/// these.
pub trait Coder {
    type Type;

    /// Convert an instance of the encodable type to bytes.
    fn encode(&self, inst: &Self::Type) -> Result<Vec<u8>>;

    /// Decode a buffer of bytes to the decodable type.
    fn decode(&self, data: &[u8]) -> Result<Self::Type>;
}

/// A `Coder` based on the CBOR data format.
pub struct CborCoder<T> {
    phantom: std::marker::PhantomData<T>,
}

impl<T> CborCoder<T> {
    pub fn new() -> Self {
        Self {
            phantom: std::marker::PhantomData::<T> {},
        }
    }
}

impl<T> Default for CborCoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Coder for CborCoder<T>
where
    T: Serialize + DeserializeOwned,
{
    type Type = T;

    fn encode(&self, inst: &Self::Type) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        ciborium::ser::into_writer(inst, &mut buffer).map_err(|e| Error::Encode(e.to_string()))?;
        Ok(buffer)
    }

    fn decode(&self, data: &[u8]) -> Result<Self::Type> {
        ciborium::de::from_reader(data).map_err(|e| Error::Decode(e.to_string()))
    }
}
