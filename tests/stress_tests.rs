//! Stress tests for proc-runner
//!
//! Many launches and status queries at once, checking handle uniqueness and
//! that every child is reaped with the right status.

use futures::executor::block_on;
use futures::future::join_all;
use proc_runner::{ExitStatus, RunRequest, Runtime, StdioDirective};
use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

static STRESS_TEST_LOCK: Mutex<()> = Mutex::new(());

/// Rapid sequential launches keep handles unique
#[test]
fn stress_rapid_launches() {
    let _lock = STRESS_TEST_LOCK.lock();
    let runtime = Runtime::builder().build().unwrap();
    let d = runtime.dispatcher();

    let mut handles = HashSet::new();
    let mut pending = Vec::new();
    for i in 0..50 {
        let response = d
            .run(RunRequest::new(["/bin/sh", "-c", format!("exit {}", i % 7).as_str()]))
            .unwrap();
        assert!(handles.insert(response.process_handle));
        pending.push((i % 7, d.run_status(response.process_handle).unwrap()));
    }

    for (code, status) in pending {
        assert_eq!(block_on(status).unwrap(), ExitStatus::Exited(code));
    }
    runtime.shutdown();
}

/// Launches from several threads share one table safely
#[test]
fn stress_parallel_launches() {
    let _lock = STRESS_TEST_LOCK.lock();
    let runtime = Arc::new(Runtime::builder().build().unwrap());

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || {
                let d = runtime.dispatcher();
                (0..10)
                    .map(|i| {
                        let response = d
                            .run(RunRequest {
                                stdout: StdioDirective::Piped,
                                ..RunRequest::new(["echo", format!("{}-{}", worker, i).as_str()])
                            })
                            .unwrap();

                        let mut out = String::new();
                        d.take_pipe(response.stdout_handle.unwrap())
                            .unwrap()
                            .read_to_string(&mut out)
                            .unwrap();
                        assert_eq!(out, format!("{}-{}\n", worker, i));

                        let status = block_on(d.run_status(response.process_handle).unwrap());
                        assert_eq!(status.unwrap(), ExitStatus::Exited(0));
                        response.process_handle
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all = HashSet::new();
    for worker in workers {
        for rid in worker.join().unwrap() {
            assert!(all.insert(rid));
        }
    }
    assert_eq!(all.len(), 80);
}

/// Many subscribers across many processes
#[test]
fn stress_fan_out() {
    let _lock = STRESS_TEST_LOCK.lock();
    let runtime = Runtime::builder().build().unwrap();
    let d = runtime.dispatcher();

    let responses: Vec<_> = (0..10)
        .map(|i| {
            d.run(RunRequest::new([
                "/bin/sh",
                "-c",
                format!("sleep 0.1; exit {}", i).as_str(),
            ]))
            .unwrap()
        })
        .collect();

    let pending: Vec<_> = responses
        .iter()
        .flat_map(|r| (0..10).map(move |_| r.process_handle))
        .map(|rid| d.run_status(rid).unwrap())
        .collect();
    let statuses = block_on(join_all(pending));

    for (idx, status) in statuses.into_iter().enumerate() {
        assert_eq!(status.unwrap(), ExitStatus::Exited((idx / 10) as i32));
    }
}
