//! Run statistics for `publish` and `subscribe`.

use std::time::Duration;

use observability::{LatencyStats, StreamMetricsAggregator};
use publisher::PublisherMetricsSnapshot;
use subscriber::ReceiverMetricsSnapshot;
use transport::InboxStats;

/// Statistics from a publish run
#[derive(Debug, Clone, Default)]
pub struct PublishStats {
    /// Topics produced
    pub topics: usize,

    /// Total duration of the run
    pub duration: Duration,

    /// Publisher counters at shutdown
    pub publisher: PublisherMetricsSnapshot,
}

impl PublishStats {
    /// Frames handed to the transport per second
    pub fn send_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.publisher.sent as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Publisher Statistics                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Topics: {}", self.topics);
        println!("   ├─ Published: {}", self.publisher.published);
        println!("   ├─ Sent: {} ({:.2}/s)", self.publisher.sent, self.send_rate());
        println!("   ├─ Coalesced: {}", self.publisher.coalesced);
        println!("   ├─ Evicted: {}", self.publisher.evicted);
        println!("   ├─ Dropped by subscriber queues: {}", self.publisher.send_dropped);
        println!("   └─ Send failures: {}", self.publisher.send_failed);
        println!();
    }
}

/// Statistics from a subscribe run
#[derive(Debug, Clone, Default)]
pub struct SubscribeStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Per-tick aggregation
    pub ticks: StreamMetricsAggregator,

    /// Receiver counters at shutdown
    pub receiver: ReceiverMetricsSnapshot,

    /// End-to-end latency
    pub latency: LatencyStats,

    /// Messages conflated away before decode
    pub inbox: InboxStats,
}

impl SubscribeStats {
    /// Render ticks per second
    pub fn tick_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ticks.ticks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Subscriber Statistics                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Render ticks: {} ({:.2}/s)", self.ticks.ticks, self.tick_rate());
        println!("   ├─ Received: {}", self.receiver.received);
        println!("   ├─ Decoded: {}", self.receiver.decoded);
        println!("   ├─ Rejected: {}", self.receiver.rejected);
        println!(
            "   ├─ Conflated in transport: {} replaced, {} dropped",
            self.inbox.replaced, self.inbox.dropped
        );
        println!("   └─ Latency: {}", self.latency);

        print!("\n{}", self.ticks.summary());
        println!();
    }
}
