//! Module containing some extension traits to support code instrumentation
//! using the `tracing` crate.

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use tracing::instrument;

use crate::record::Record;
use crate::store::{self, CommitError, ReadError};
use crate::version::{self, Version};

/// [`store::Store`] type wrapper that provides instrumentation
/// features through the `tracing` crate.
#[derive(Debug, Clone)]
pub struct InstrumentedStore<S, T> {
    store: S,
    payload: PhantomData<T>,
}

#[async_trait]
impl<S, Id, T> store::Reader<Id, T> for InstrumentedStore<S, T>
where
    S: store::Store<Id, T>,
    Id: Debug + Send + Sync,
    T: Debug + Send + Sync,
{
    #[allow(clippy::blocks_in_conditions)]
    #[instrument(
        name = "store::Reader.read",
        level = "debug",
        ret,
        err(level = "debug"),
        skip(self)
    )]
    async fn read(&self, id: &Id) -> Result<Record<Id, T>, ReadError> {
        self.store.read(id).await
    }
}

#[async_trait]
impl<S, Id, T> store::Committer<Id, T> for InstrumentedStore<S, T>
where
    S: store::Store<Id, T>,
    Id: Debug + Send + Sync,
    T: Debug + Send + Sync,
{
    #[allow(clippy::blocks_in_conditions)]
    #[instrument(
        name = "store::Committer.commit",
        level = "debug",
        ret,
        err(level = "debug"),
        skip(self)
    )]
    async fn commit(
        &self,
        id: &Id,
        version_check: version::Check,
        payload: T,
    ) -> Result<Version, CommitError> {
        self.store.commit(id, version_check, payload).await
    }
}

/// Extension trait for any [`store::Store`] type to provide
/// instrumentation features through the `tracing` crate.
pub trait StoreExt<Id, T>: store::Store<Id, T> + Sized
where
    Id: Debug + Send + Sync,
    T: Debug + Send + Sync,
{
    /// Returns an instrumented version of the [`store::Store`] instance.
    fn with_tracing(self) -> InstrumentedStore<Self, T> {
        InstrumentedStore {
            store: self,
            payload: PhantomData,
        }
    }
}

impl<S, Id, T> StoreExt<Id, T> for S
where
    S: store::Store<Id, T>,
    Id: Debug + Send + Sync,
    T: Debug + Send + Sync,
{
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::inmemory::InMemory;
    use crate::store::{Committer, Reader};
    use crate::version::Check;

    use std::io;
    use std::sync::Arc;

    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn instrumented_store_behaves_like_the_inner_one() {
        let backend = InMemory::default();
        backend.insert(1_u64, "v0").expect("insert should succeed");

        let store = backend.with_tracing();

        let version = store
            .commit(&1, Check::MustBe(0), "v1")
            .await
            .expect("commit should succeed");
        assert_eq!(1, version);

        let err = store
            .commit(&1, Check::MustBe(0), "stale")
            .await
            .expect_err("stale commit should conflict");
        assert!(matches!(err, CommitError::Conflict(_)));

        let record = store.read(&1).await.expect("record should exist");
        assert_eq!(&"v1", record.payload());
        assert_eq!(Err(ReadError::NotFound), store.read(&2).await);
    }

    #[tokio::test]
    async fn conflicts_are_traced_below_the_error_level() {
        let captured = Captured::default();
        let writer = captured.clone();

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .without_time()
            .with_writer(move || writer.clone())
            .finish();

        let _guard = tracing::subscriber::set_default(subscriber);

        let backend = InMemory::default();
        backend.insert(1_u64, "v0").expect("insert should succeed");

        let store = backend.with_tracing();

        store
            .commit(&1, Check::MustBe(0), "v1")
            .await
            .expect("commit should succeed");

        let err = store
            .commit(&1, Check::MustBe(0), "stale")
            .await
            .expect_err("stale commit should conflict");
        assert!(matches!(err, CommitError::Conflict(_)));

        let output = captured.contents();
        assert!(output.contains("conflict error detected"), "{output}");
        assert!(output.contains("DEBUG"), "{output}");
        assert!(!output.contains("ERROR"), "{output}");
    }
}
