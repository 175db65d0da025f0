//! Stress tests for handler derivation and ambient fields
//!
//! These tests hammer one shared handler and one shared field store from many
//! threads to check that derivations never leak into each other and that
//! concurrent appends are not lost.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use logbridge::{
    Attr, Context, FieldNames, GroupHandler, HandlerOptions, JsonSink, Level, MemoryWriter,
    Record, fields_from_context, with_fields,
};

fn shared_handler() -> (GroupHandler<JsonSink<MemoryWriter>>, MemoryWriter) {
    let out = MemoryWriter::new();
    let sink = JsonSink::with_options(out.clone(), Level::DEBUG, FieldNames::default());
    let handler = GroupHandler::new(sink, HandlerOptions { skip_time: true })
        .with_attrs([Attr::string("service", "stress")]);
    (handler, out)
}

/// Many threads derive from the same ancestor and log through their child
#[test]
fn test_concurrent_derivation_from_one_ancestor() {
    const NUM_THREADS: usize = 32;
    const ITERATIONS: usize = 50;

    let (base, out) = shared_handler();
    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];

    let start = Instant::now();

    for thread_id in 0..NUM_THREADS {
        let base = base.clone();
        let barrier = Arc::clone(&barrier);

        handles.push(thread::spawn(move || {
            barrier.wait();

            for i in 0..ITERATIONS {
                let child = base
                    .with_attrs([Attr::uint("thread", thread_id as u64)])
                    .with_group("work")
                    .with_attrs([Attr::uint("iteration", i as u64)]);

                child
                    .handle(
                        &Context::background(),
                        Record::new(Level::INFO, "tick"),
                    )
                    .unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let lines = out.lines();
    assert_eq!(lines.len(), NUM_THREADS * ITERATIONS);

    let mut seen = HashSet::new();
    for line in &lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        let object = value.as_object().unwrap();

        // exactly level, service, thread, work, message
        assert_eq!(object.len(), 5, "unexpected fields in {}", line);
        assert_eq!(value["service"], "stress");
        assert_eq!(value["work"].as_object().unwrap().len(), 1);

        let key = (
            value["thread"].as_u64().unwrap(),
            value["work"]["iteration"].as_u64().unwrap(),
        );
        assert!(seen.insert(key), "duplicate line {}", line);
    }

    // the ancestor still carries only its own attribute
    assert_eq!(base.group_names(), vec![""]);

    println!(
        "Logged {} derived events across {} threads in {:?}",
        NUM_THREADS * ITERATIONS,
        NUM_THREADS,
        start.elapsed()
    );
}

/// Many threads append to one field store concurrently
#[test]
fn test_concurrent_ambient_appends() {
    const NUM_THREADS: usize = 16;
    const ITERATIONS: usize = 100;

    let ctx = with_fields(&Context::background(), [Attr::string("request_id", "r-1")]);
    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];

    for thread_id in 0..NUM_THREADS {
        let ctx = ctx.clone();
        let barrier = Arc::clone(&barrier);

        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..ITERATIONS {
                let returned = with_fields(&ctx, [Attr::string(format!("t{}_{}", thread_id, i), "x")]);
                assert!(returned.ptr_eq(&ctx));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let store = fields_from_context(&ctx).unwrap();
    assert_eq!(store.len(), 1 + NUM_THREADS * ITERATIONS);
}

/// Logging while other threads append to the same store
#[test]
fn test_logging_during_ambient_appends() {
    const WRITERS: usize = 4;
    const ITERATIONS: usize = 200;

    let (handler, out) = shared_handler();
    let ctx = with_fields(&Context::background(), [Attr::int("seed", 0)]);
    let barrier = Arc::new(Barrier::new(WRITERS + 1));
    let mut handles = vec![];

    for thread_id in 0..WRITERS {
        let ctx = ctx.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..ITERATIONS {
                with_fields(&ctx, [Attr::int(format!("w{}_{}", thread_id, i), 1)]);
            }
        }));
    }

    barrier.wait();
    for _ in 0..ITERATIONS {
        handler
            .handle(&ctx, Record::new(Level::INFO, "reading"))
            .unwrap();
    }

    for handle in handles {
        handle.join().unwrap();
    }

    for line in out.lines() {
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["seed"], 0);
    }
}

/// A deep chain of groups nests in order
#[test]
fn test_deep_group_chain() {
    let (mut handler, out) = shared_handler();
    for depth in 0..100 {
        handler = handler
            .with_group(&format!("g{}", depth))
            .with_attrs([Attr::int("depth", depth)]);
    }

    handler
        .handle(&Context::background(), Record::new(Level::INFO, "deep"))
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&out.lines()[0]).unwrap();
    let mut node = &value;
    for depth in 0..100 {
        node = &node[format!("g{}", depth)];
        assert_eq!(node["depth"], depth);
    }
}
