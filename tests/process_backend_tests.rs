//! End-to-end tests for the forked-process backend.
//!
//! Kept in their own binary: every pipeline here forks child processes,
//! and one test makes a child exit abruptly, which must never take the
//! thread- or sync-backend tests down with it.

use flowpipe::node::{Context, Node};
use flowpipe::nodes::{Grep, Identity, IterSrc, Map, Reverse};
use flowpipe::{Backend, Error, Pipeline, Result, Value};
use std::time::{Duration, Instant};

/// Route engine logs through tracing; `RUST_LOG=flowpipe=debug` shows the
/// worker lifecycle while debugging a test.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn ints(values: impl IntoIterator<Item = i64>) -> Vec<Value> {
    values.into_iter().map(Value::Int).collect()
}

fn sorted_ints(values: Vec<Value>) -> Vec<i64> {
    let mut out: Vec<i64> = values.iter().filter_map(Value::as_int).collect();
    out.sort_unstable();
    out
}

#[test]
fn test_identity_across_processes() {
    init_tracing();
    let pipeline = Pipeline::with_backend(Backend::Process);
    let src = pipeline.add(IterSrc::new(0..10i64)).unwrap();
    let id = pipeline.add(Identity::new()).unwrap();
    src.feeds_into(&id).unwrap();
    assert_eq!(id.results().unwrap(), ints(0..10));
}

#[test]
fn test_squares_across_processes() {
    let pipeline = Pipeline::with_backend(Backend::Process);
    let src = pipeline.add(IterSrc::new([1i64, 2, 3])).unwrap();
    let square = pipeline
        .add(Map::new(|v| Value::Int(v.as_int().unwrap_or(0).pow(2))))
        .unwrap();
    src.feeds_into(&square).unwrap();
    assert_eq!(square.results().unwrap(), ints([1, 4, 9]));
}

#[test]
fn test_grep_across_processes() {
    // Regex state lives in the child: the node is cloned into the fork.
    let pipeline = Pipeline::with_backend(Backend::Process);
    let src = pipeline
        .add(IterSrc::new(["cat", "catalog", "dog"]))
        .unwrap();
    let grep = pipeline.add(Grep::new("^cat").unwrap()).unwrap();
    src.feeds_into(&grep).unwrap();
    assert_eq!(
        grep.results().unwrap(),
        vec![Value::Str("cat".into()), Value::Str("catalog".into())]
    );
}

#[test]
fn test_reverse_across_processes() {
    // Teardown output crosses the process boundary after the last input.
    let pipeline = Pipeline::with_backend(Backend::Process);
    let src = pipeline.add(IterSrc::new([10i64, 20, 30])).unwrap();
    let reverse = pipeline.add(Reverse::new()).unwrap();
    src.feeds_into(&reverse).unwrap();
    assert_eq!(reverse.results().unwrap(), ints([30, 20, 10]));
}

#[test]
fn test_multi_worker_processes_everything() {
    let pipeline = Pipeline::with_backend(Backend::Process);
    let src = pipeline.add(IterSrc::new(0..40i64)).unwrap();
    let doubler = pipeline
        .add_workers(Map::new(|v| Value::Int(v.as_int().unwrap_or(0) * 2)), 4)
        .unwrap();
    let collector = pipeline.add(Identity::new()).unwrap();
    src.feeds_into(&doubler).unwrap().feeds_into(&collector).unwrap();

    let mut seen: Vec<i64> = collector
        .results()
        .unwrap()
        .iter()
        .filter_map(Value::as_int)
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..40).map(|i| i * 2).collect::<Vec<_>>());
}

#[test]
fn test_round_robin_fanout_across_processes() {
    // Item i must reach sibling (i mod k) even when each sibling is a
    // separate forked process: tag each sibling's share and collect at a
    // single terminal.
    let k = 3usize;
    let n = 12i64;
    let pipeline = Pipeline::with_backend(Backend::Process);
    let src = pipeline.add(IterSrc::new(0..n)).unwrap();
    let collector = pipeline.add(Identity::new()).unwrap();
    for tag in 0..k {
        let sibling = pipeline
            .add(Map::new(move |v| {
                Value::List(vec![Value::Int(tag as i64), v])
            }))
            .unwrap();
        src.feeds_into(&sibling).unwrap().feeds_into(&collector).unwrap();
    }

    let results = collector.results().unwrap();
    assert_eq!(results.len(), n as usize);
    for value in results {
        let record = value.as_list().unwrap();
        let tag = record[0].as_int().unwrap();
        let item = record[1].as_int().unwrap();
        assert_eq!(tag, item % k as i64, "item {item} on wrong sibling");
    }
}

#[test]
fn test_feed_preloads_forked_input() {
    let pipeline = Pipeline::with_backend(Backend::Process);
    let id = pipeline.add(Identity::new()).unwrap();
    id.feed([1i64, 2, 3]).unwrap();
    assert_eq!(id.results().unwrap(), ints([1, 2, 3]));
}

#[test]
fn test_large_feed_does_not_deadlock() {
    // A preload well past the socket buffer can only flush while the
    // forked reader is draining it; start() must not block on the flush.
    let n = 100_000i64;
    let pipeline = Pipeline::with_backend(Backend::Process);
    let id = pipeline.add(Identity::new()).unwrap();
    id.feed(0..n).unwrap();
    assert_eq!(id.results().unwrap().len(), n as usize);
}

/// Sleeps a fixed delay per item: wall time exposes worker parallelism.
#[derive(Clone)]
struct SlowNode {
    delay: Duration,
}

impl Node for SlowNode {
    fn process(&mut self, value: Value, ctx: &mut Context) -> Result<()> {
        std::thread::sleep(self.delay);
        ctx.emit(value)
    }
}

#[test]
fn test_forked_workers_run_in_parallel() {
    let n = 10i64;
    let delay = Duration::from_millis(50);
    let serial_floor = delay * n as u32; // n * d

    // Five forked workers approach ceil(n/w) * d; well under n * d.
    let start = Instant::now();
    let pipeline = Pipeline::with_backend(Backend::Process);
    let src = pipeline.add(IterSrc::new(0..n)).unwrap();
    let slow = pipeline.add_workers(SlowNode { delay }, 5).unwrap();
    src.feeds_into(&slow).unwrap();
    assert_eq!(
        sorted_ints(slow.results().unwrap()),
        (0..n).collect::<Vec<_>>()
    );
    let parallel = start.elapsed();
    assert!(
        parallel < serial_floor.mul_f32(0.75),
        "expected parallel speedup, took {parallel:?}"
    );
}

#[test]
fn test_node_error_crosses_process_boundary() {
    // The failure message travels through the shared-memory flag back to
    // the parent, word for word.
    #[derive(Clone)]
    struct Rejector;
    impl Node for Rejector {
        fn process(&mut self, _value: Value, _ctx: &mut Context) -> Result<()> {
            Err(Error::Node("rejected in child".into()))
        }
    }

    let pipeline = Pipeline::with_backend(Backend::Process);
    let src = pipeline.add(IterSrc::new(0..3i64)).unwrap();
    let bad = pipeline.add(Rejector).unwrap();
    src.feeds_into(&bad).unwrap();

    match bad.results() {
        Err(Error::WorkerFailures(failures)) => {
            assert_eq!(failures.len(), 1);
            assert!(
                failures[0].message.contains("rejected in child"),
                "unexpected message: {}",
                failures[0].message
            );
        }
        other => panic!("expected WorkerFailures, got {other:?}"),
    }
}

#[test]
fn test_dead_child_is_detected() {
    init_tracing();
    // A child that exits without signalling its flag must be reaped and
    // reported, not waited on forever.
    #[derive(Clone)]
    struct Vanishes;
    impl Node for Vanishes {
        fn process(&mut self, _value: Value, _ctx: &mut Context) -> Result<()> {
            std::process::exit(7);
        }
    }

    let pipeline = Pipeline::with_backend(Backend::Process);
    let src = pipeline.add(IterSrc::new(0..3i64)).unwrap();
    let bad = pipeline.add(Vanishes).unwrap();
    src.feeds_into(&bad).unwrap();

    match bad.results() {
        Err(Error::WorkerFailures(failures)) => {
            assert_eq!(failures.len(), 1);
            assert!(
                failures[0].message.contains("exited with status 7"),
                "unexpected message: {}",
                failures[0].message
            );
        }
        other => panic!("expected WorkerFailures, got {other:?}"),
    }
}
