// tests/common/mod.rs
//
// Common test utilities: an instrumented in-memory gateway with injectable
// failures and latency.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};

use s3bulk::{ByteSource, MemoryGateway, ObjectReader, StorageGateway};

/// Wraps a [`MemoryGateway`], counting calls and failing on demand.
#[derive(Default)]
pub struct TestGateway {
    pub inner: MemoryGateway,

    pub bucket_checks: AtomicUsize,
    pub creates: AtomicUsize,
    pub opens: AtomicUsize,
    pub puts: AtomicUsize,

    /// Highest number of open/put calls observed running at once.
    pub peak_in_flight: AtomicUsize,
    in_flight: AtomicUsize,

    pub fail_bucket_check: AtomicBool,
    pub fail_create: AtomicBool,
    /// Object names whose open/put is refused with a permission error.
    pub denied: Mutex<HashSet<String>>,
    /// Object names whose put/open panics.
    pub panicking: Mutex<HashSet<String>>,
    /// Object names whose body stream fails after the given number of bytes.
    pub broken_after: Mutex<HashMap<String, usize>>,
    /// Upper bound (ms) of random latency added to open/put.
    pub max_latency_ms: AtomicUsize,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(max_ms: usize) -> Self {
        let gw = Self::default();
        gw.max_latency_ms.store(max_ms, Ordering::SeqCst);
        gw
    }

    pub fn deny(&self, name: &str) {
        self.denied.lock().unwrap().insert(name.to_string());
    }

    pub fn panic_on(&self, name: &str) {
        self.panicking.lock().unwrap().insert(name.to_string());
    }

    pub fn break_body_after(&self, name: &str, bytes: usize) {
        self.broken_after.lock().unwrap().insert(name.to_string(), bytes);
    }

    pub fn item_calls(&self) -> usize {
        self.opens.load(Ordering::SeqCst) + self.puts.load(Ordering::SeqCst)
    }

    async fn item_call(&self, name: &str) -> Result<InFlight<'_>> {
        let guard = InFlight::enter(self);
        let max = self.max_latency_ms.load(Ordering::SeqCst);
        if max > 0 {
            let ms = rand::rng().random_range(0..=max as u64);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.panicking.lock().unwrap().contains(name) {
            panic!("injected panic for {name}");
        }
        if self.denied.lock().unwrap().contains(name) {
            bail!("access denied for '{}'", name);
        }
        Ok(guard)
    }
}

struct InFlight<'a>(&'a TestGateway);

impl<'a> InFlight<'a> {
    fn enter(gw: &'a TestGateway) -> Self {
        let now = gw.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        gw.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(gw)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageGateway for TestGateway {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.bucket_checks.fetch_add(1, Ordering::SeqCst);
        if self.fail_bucket_check.load(Ordering::SeqCst) {
            bail!("connection refused while checking '{}'", bucket);
        }
        self.inner.bucket_exists(bucket).await
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            bail!("quota exceeded creating '{}'", bucket);
        }
        self.inner.create_bucket(bucket).await
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.inner.delete_bucket(bucket).await
    }

    async fn open_object(&self, bucket: &str, name: &str) -> Result<ObjectReader> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let _guard = self.item_call(name).await?;
        let reader = self.inner.open_object(bucket, name).await?;
        match self.broken_after.lock().unwrap().get(name) {
            Some(&after) => Ok(Box::pin(BrokenReader::new(after))),
            None => Ok(reader),
        }
    }

    async fn put_object(&self, bucket: &str, name: &str, body: Bytes, size: u64) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let _guard = self.item_call(name).await?;
        self.inner.put_object(bucket, name, body, size).await
    }
}

/// Yields `remaining` filler bytes, then fails as if the connection dropped.
pub struct BrokenReader {
    remaining: usize,
}

impl BrokenReader {
    pub fn new(remaining: usize) -> Self {
        Self { remaining }
    }
}

impl AsyncRead for BrokenReader {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        if self.remaining == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset mid-body",
            )));
        }
        let n = self.remaining.min(buf.remaining());
        buf.put_slice(&vec![0xAB; n]);
        self.remaining -= n;
        Poll::Ready(Ok(()))
    }
}

/// Upload source whose stream breaks after `after` bytes.
pub struct BrokenSource {
    pub after: usize,
}

#[async_trait]
impl ByteSource for BrokenSource {
    async fn open(&self) -> Result<ObjectReader> {
        Ok(Box::pin(BrokenReader::new(self.after)))
    }
}

/// Upload source that reads fine but panics when the worker drops it.
pub struct PanicOnDropSource(pub Bytes);

#[async_trait]
impl ByteSource for PanicOnDropSource {
    async fn open(&self) -> Result<ObjectReader> {
        Ok(Box::pin(io::Cursor::new(self.0.clone())))
    }
}

impl Drop for PanicOnDropSource {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            panic!("source teardown failed");
        }
    }
}

/// Deterministic per-object payload.
pub fn payload(name: &str, len: usize) -> Bytes {
    let seed = name.bytes().fold(7u8, |acc, b| acc.wrapping_mul(31).wrapping_add(b));
    Bytes::from((0..len).map(|i| seed.wrapping_add(i as u8)).collect::<Vec<u8>>())
}

/// Populate `bucket` with `count` objects named `obj-000`, `obj-001`, ...
pub fn seed_objects(gw: &MemoryGateway, bucket: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let name = format!("obj-{i:03}");
            gw.insert_object(bucket, &name, payload(&name, 256 + i));
            name
        })
        .collect()
}
