//! Worker threads driving a push-style receive loop over an `InMemoryQueue`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tracing::{debug, trace};

use super::queue::InMemoryQueue;
use crate::broker::{
    CancellationSignal, ExceptionReceivedContext, ExceptionSink, MessageCallback,
    ReceiveLoopHandle, ReceiveOptions, ReceiveStats,
};
use crate::error::BusError;

/// Spawn `max_concurrent_calls` workers that receive from `queue` and call
/// `callback` for every message.
///
/// Failed or panicking callbacks are reported to the exception sink and the
/// message is abandoned. A successful callback that did not complete the message also
/// abandons it, unless `auto_complete` is set.
pub(crate) fn start(
    queue: InMemoryQueue,
    callback: MessageCallback,
    options: ReceiveOptions,
    exception_sink: ExceptionSink,
) -> ReceiveLoopHandle {
    let signal = CancellationSignal::new();
    let workers = (0..options.max_concurrent_calls.max(1))
        .map(|worker| {
            let queue = queue.clone();
            let callback = callback.clone();
            let options = options.clone();
            let sink = exception_sink.clone();
            let signal = signal.clone();
            thread::spawn(move || run_worker(worker, queue, callback, options, sink, signal))
        })
        .collect();

    debug!(
        entity_path = %queue.path(),
        max_concurrent_calls = options.max_concurrent_calls.max(1),
        "receive loop started"
    );
    ReceiveLoopHandle::new(signal, workers)
}

fn run_worker(
    worker: usize,
    queue: InMemoryQueue,
    callback: MessageCallback,
    options: ReceiveOptions,
    sink: ExceptionSink,
    signal: CancellationSignal,
) -> ReceiveStats {
    let mut stats = ReceiveStats::default();
    let report = |error: &BusError, action: &str| {
        sink(&ExceptionReceivedContext {
            error,
            action,
            endpoint: &options.endpoint,
            entity_path: queue.path(),
        })
    };

    while !signal.is_cancelled() {
        stats.polls += 1;

        let message = match queue.receive(options.poll_interval) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(err) => {
                report(&BusError::Broker(err), "Receive");
                thread::sleep(options.poll_interval);
                continue;
            }
        };

        let Some(lock_token) = message.lock_token.clone() else {
            continue;
        };
        trace!(worker, message_id = %message.message_id, "dispatching message");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(&message, &signal)))
            .unwrap_or_else(|payload| {
                Err(BusError::CallbackPanicked {
                    message_id: message.message_id.clone(),
                    reason: panic_reason(payload.as_ref()),
                })
            });

        match outcome {
            Ok(()) => {
                stats.handled += 1;
                if options.auto_complete && queue.is_locked(&lock_token) {
                    if let Err(err) = queue.complete_message(&lock_token) {
                        report(&BusError::Broker(err), "Complete");
                    }
                }
            }
            Err(err) => {
                stats.failed += 1;
                report(&err, "UserCallback");
            }
        }

        // Anything still locked goes back for redelivery.
        if queue.is_locked(&lock_token) {
            if let Err(err) = queue.abandon(&lock_token) {
                report(&BusError::Broker(err), "Abandon");
            }
        }
    }

    debug!(worker, entity_path = %queue.path(), "receive worker stopped");
    stats
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        reason.to_string()
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
