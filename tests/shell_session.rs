//! The interactive loop stays usable while the detection service stalls.

use std::io::Cursor;
use std::net::TcpListener;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use detect_client::controller::{Controller, ControllerOptions};
use detect_client::detect::HttpService;
use detect_client::health::ModelStatus;
use detect_client::notify::MemoryNotifier;
use detect_client::shell::Shell;
use detect_client::ui::Ui;

/// Accepts connections and keeps them open without ever answering.
fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => held.push(stream),
                Err(_) => return,
            }
        }
    });
    format!("http://{}", addr)
}

#[test]
fn commands_run_while_health_check_is_stalled() {
    let base = silent_server();
    let service = HttpService::new(&base).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let options = ControllerOptions {
        download_dir: dir.path().to_path_buf(),
        previews: false,
        ..ControllerOptions::default()
    };
    let controller = Controller::new(
        Arc::new(service),
        Box::new(MemoryNotifier::new()),
        Ui::quiet(),
        options,
    );
    let mut shell = Shell::new(controller, Vec::new(), dir.path().to_path_buf(), false);

    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let outcome = shell.run(Cursor::new(b"status\nhealth\nquit\n".to_vec()));
        let _ = done_tx.send((outcome.is_ok(), shell.into_parts()));
    });

    let (ok, (controller, out)) = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("shell answered while the health check was outstanding");
    assert!(ok);
    assert!(controller.health_pending());
    assert_eq!(controller.model_status(), ModelStatus::Unknown);

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("State:      empty"));
    assert!(out.contains("Service:    Checking Model"));
    assert!(out.contains("Health check already running."));
}
