//! Serial task queue guaranteeing exclusive, ordered access to shared
//! browser state.
//!
//! Every operation that touches the shared interactive session (and, to
//! avoid simultaneous browser launches, every render task too) is submitted
//! here. Tasks run strictly in submission order, one at a time, for the
//! lifetime of the process. A task's own failure is reported only to its
//! submitter; the worker chain survives both error results and panics.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// FIFO execution sequencer backed by a single worker task.
///
/// Cloning is cheap and shares the same worker, so one queue instance can be
/// handed to every workflow that must not overlap with the others.
#[derive(Clone)]
pub struct SerialQueue {
	tx: mpsc::UnboundedSender<Job>,
}

impl SerialQueue {
	/// Creates the queue and spawns its worker. The worker runs until every
	/// clone of the queue has been dropped.
	pub fn new() -> Self {
		let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
		tokio::spawn(async move {
			while let Some(job) = rx.recv().await {
				job.await;
			}
			debug!(target: "ticketry.queue", "queue worker shutting down");
		});
		Self { tx }
	}

	/// Submits a task and returns a future resolving to its result.
	///
	/// The job is placed on the channel before this function returns, so
	/// submission order is the call order even when the returned future is
	/// polled late or discarded. Task failures never stall the queue: an
	/// `Err` is forwarded to the submitter, and a panic is caught, logged
	/// and reported as [`EngineError::TaskPanicked`].
	pub fn enqueue<T, Fut>(&self, label: &'static str, task: Fut) -> impl Future<Output = Result<T>>
	where
		T: Send + 'static,
		Fut: Future<Output = Result<T>> + Send + 'static,
	{
		let (done_tx, done_rx) = oneshot::channel::<Result<T>>();
		let job: Job = Box::pin(async move {
			match AssertUnwindSafe(task).catch_unwind().await {
				Ok(result) => {
					if let Err(err) = &result {
						warn!(target: "ticketry.queue", task = label, error = %err, "queued task failed");
					}
					// Submitter may have gone away; that is fine.
					let _ = done_tx.send(result);
				}
				Err(_) => {
					warn!(target: "ticketry.queue", task = label, "queued task panicked");
				}
			}
		});
		let submitted = self.tx.send(job).is_ok();

		async move {
			if !submitted {
				return Err(EngineError::QueueClosed);
			}
			match done_rx.await {
				Ok(result) => result,
				// Sender dropped without a result: the task panicked.
				Err(_) => Err(EngineError::TaskPanicked),
			}
		}
	}
}

impl Default for SerialQueue {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	use tokio::sync::Mutex;

	use super::*;

	#[tokio::test(start_paused = true)]
	async fn tasks_run_in_submission_order_without_overlap() {
		let queue = SerialQueue::new();
		let order = Arc::new(Mutex::new(Vec::new()));
		let in_flight = Arc::new(AtomicUsize::new(0));
		let max_in_flight = Arc::new(AtomicUsize::new(0));

		let mut handles = Vec::new();
		for i in 0..8usize {
			let order = order.clone();
			let in_flight = in_flight.clone();
			let max_in_flight = max_in_flight.clone();
			handles.push(queue.enqueue("test", async move {
				let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
				max_in_flight.fetch_max(now, Ordering::SeqCst);
				// Yield across a timer so overlap would be observable.
				tokio::time::sleep(Duration::from_millis(50)).await;
				order.lock().await.push(i);
				in_flight.fetch_sub(1, Ordering::SeqCst);
				Ok(i)
			}));
		}

		for (i, handle) in handles.into_iter().enumerate() {
			assert_eq!(handle.await.unwrap(), i);
		}
		assert_eq!(*order.lock().await, (0..8).collect::<Vec<_>>());
		assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn failing_task_reports_only_to_its_caller() {
		let queue = SerialQueue::new();

		let failing = queue.enqueue("fails", async {
			Err::<(), _>(EngineError::Launch("boom".into()))
		});
		let following = queue.enqueue("follows", async { Ok(42) });

		assert!(matches!(failing.await, Err(EngineError::Launch(_))));
		assert_eq!(following.await.unwrap(), 42);
	}

	#[tokio::test(start_paused = true)]
	async fn panicking_task_does_not_poison_the_queue() {
		let queue = SerialQueue::new();

		let poisoned = queue.enqueue("panics", async {
			panic!("deliberate");
			#[allow(unreachable_code)]
			Ok(())
		});
		let survivor = queue.enqueue("survives", async { Ok("still running") });

		assert!(matches!(poisoned.await, Err(EngineError::TaskPanicked)));
		assert_eq!(survivor.await.unwrap(), "still running");
	}

	#[tokio::test(start_paused = true)]
	async fn discarded_result_future_still_keeps_fifo_placement() {
		let queue = SerialQueue::new();
		let order = Arc::new(Mutex::new(Vec::new()));

		let first_order = order.clone();
		// Caller discards the future: fire-and-forget submission.
		drop(queue.enqueue("discarded", async move {
			first_order.lock().await.push("first");
			Ok(())
		}));

		let second_order = order.clone();
		queue
			.enqueue("awaited", async move {
				second_order.lock().await.push("second");
				Ok(())
			})
			.await
			.unwrap();

		assert_eq!(*order.lock().await, vec!["first", "second"]);
	}
}
