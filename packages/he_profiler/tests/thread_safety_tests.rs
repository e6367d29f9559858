//! Tests for using one profiler from many threads, including while it is being finished.

use std::sync::{Arc, Barrier};
use std::thread;

use energy_source::EnergySource;
use he_profiler::{Error, Profiler, ProfilerConfig, StreamConfig};
use testing::{ScriptedEnergySource, with_watchdog};

const THREADS: usize = 4;
const EVENTS_PER_THREAD: u64 = 500;

fn scripted() -> energy_source::Result<Box<dyn EnergySource>> {
    Ok(ScriptedEnergySource::new(1).boxed())
}

fn stream_per_thread() -> ProfilerConfig {
    ProfilerConfig::builder()
        .streams((0..THREADS).map(|_| StreamConfig::anonymous()))
        .build()
}

#[test]
fn each_thread_owns_a_stream() {
    with_watchdog(|| {
        let profiler = Arc::new(Profiler::new());
        profiler
            .init_with_energy_source(&stream_per_thread(), scripted)
            .unwrap();

        let workers = (0..THREADS)
            .map(|stream| {
                let profiler = Arc::clone(&profiler);

                thread::spawn(move || {
                    let mut event = profiler.begin().unwrap();

                    for id in 0..EVENTS_PER_THREAD {
                        profiler.end_then_begin(stream, id, 1, &mut event).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();

        for worker in workers {
            worker.join().unwrap();
        }

        for stream in 0..THREADS {
            assert_eq!(profiler.heartbeats(stream).unwrap(), EVENTS_PER_THREAD);

            let last = profiler.last_heartbeat(stream).unwrap().unwrap();
            assert_eq!(last.tag, EVENTS_PER_THREAD - 1);
            assert_eq!(last.global_work, EVENTS_PER_THREAD);
        }

        profiler.finish().unwrap();
    });
}

#[test]
fn operations_racing_finish_fail_cleanly() {
    with_watchdog(|| {
        let profiler = Arc::new(Profiler::new());
        profiler
            .init_with_energy_source(&stream_per_thread(), scripted)
            .unwrap();

        let started = Arc::new(Barrier::new(THREADS + 1));

        let workers = (0..THREADS)
            .map(|stream| {
                let profiler = Arc::clone(&profiler);
                let started = Arc::clone(&started);

                thread::spawn(move || {
                    started.wait();

                    // Keep reporting until the profiler is gone. Every error must say so.
                    loop {
                        let mut event = match profiler.begin() {
                            Ok(event) => event,
                            Err(Error::InvalidState) => return,
                            Err(e) => panic!("unexpected error from begin: {e}"),
                        };

                        match profiler.end(stream, 1, 1, &mut event) {
                            Ok(()) => {}
                            Err(Error::InvalidState) => return,
                            Err(e) => panic!("unexpected error from end: {e}"),
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        started.wait();
        profiler.finish().unwrap();

        for worker in workers {
            worker.join().unwrap();
        }

        assert!(!profiler.is_active());
    });
}
