//! Handler fan-out benchmark suite.
//!
//! Measures the cost of delivering pushed events to registered handlers:
//! - Handler counts per event: 1, 8, 64
//! - Registry churn (register / unregister) on the provider
//!
//! Run with: cargo bench --bench fanout
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use tokio::runtime::Runtime;
use tokio::sync::{Notify, mpsc};

use realtime_transport::{
    Connector, Envelope, Handler, Link, LinkPeer, RealtimeProvider, Result, SubjectId,
};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const HANDLER_COUNTS: &[usize] = &[1, 8, 64];
const BATCH: usize = 1_000;

// ============================================================================
// Loopback Connector
// ============================================================================

/// Hands the server end of every link to the benchmark.
struct Loopback {
    peers: mpsc::UnboundedSender<LinkPeer>,
}

#[async_trait]
impl Connector for Loopback {
    async fn open(&self, _subject: &SubjectId) -> Result<Link> {
        let (link, peer) = Link::pair();
        let _ = self.peers.send(peer);
        Ok(link)
    }
}

/// Bound provider plus the server end of its link.
async fn connected_provider(handlers: usize) -> (RealtimeProvider, LinkPeer, Arc<Notify>) {
    let (peers_tx, mut peers_rx) = mpsc::unbounded_channel();
    let provider = RealtimeProvider::builder()
        .connector(Arc::new(Loopback { peers: peers_tx }))
        .build()
        .expect("valid configuration");

    let delivered = Arc::new(AtomicUsize::new(0));
    for _ in 0..handlers {
        let delivered = Arc::clone(&delivered);
        provider.on(
            "tick",
            Handler::new(move |_| {
                delivered.fetch_add(1, Ordering::Relaxed);
            }),
        );
    }

    let done = Arc::new(Notify::new());
    let marker = Arc::clone(&done);
    provider.on("marker", Handler::new(move |_| marker.notify_one()));

    provider
        .set_subject(Some(SubjectId::new("bench").expect("valid subject")), true)
        .expect("inside runtime");
    let peer = peers_rx.recv().await.expect("link opened");

    (provider, peer, done)
}

// ============================================================================
// Benchmark: Dispatch
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(BATCH as u64));

    for &count in HANDLER_COUNTS {
        let (provider, peer, done) = rt.block_on(connected_provider(count));
        let (peer, done) = (&peer, &done);

        group.bench_with_input(BenchmarkId::new("handlers", count), &count, |b, _| {
            b.to_async(&rt).iter(|| async move {
                for seq in 0..BATCH {
                    peer.send(Envelope::new("tick", json!({ "seq": seq })));
                }
                peer.send(Envelope::new("marker", json!(null)));
                done.notified().await;
            });
        });

        drop(provider);
    }

    group.finish();
}

// ============================================================================
// Benchmark: Registry Churn
// ============================================================================

fn bench_registry_churn(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (provider, _peer, _done) = rt.block_on(connected_provider(0));
    let handlers: Vec<Handler> = (0..64).map(|_| Handler::new(|_| {})).collect();

    c.bench_function("registry_churn", |b| {
        b.iter(|| {
            for handler in &handlers {
                provider.on("presence", handler.clone());
            }
            for handler in &handlers {
                provider.off("presence", handler);
            }
        });
    });
}

criterion_group!(benches, bench_dispatch, bench_registry_churn);
criterion_main!(benches);
