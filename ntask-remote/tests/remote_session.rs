use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use ntask_core::{Clock, SystemClock};
use ntask_engine::{Controller, EventBus, EventLog, Procedure, TaskConfig};
use ntask_remote::RemoteServer;

fn fast_config(trials: usize) -> TaskConfig {
    TaskConfig {
        trial_count: trials,
        blank_screen_ms: 5,
        stimulus_ms: 5,
        info_ms: 5,
        lead_in_ms: 0,
        ..TaskConfig::default()
    }
}

fn start_stack(config: TaskConfig) -> (Controller, RemoteServer) {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let log = EventLog::new(Arc::clone(&clock));
    let bus = Arc::new(EventBus::new());
    let wire_events = bus.subscribe();
    let procedure = Procedure::new(config, log, bus, clock, StdRng::seed_from_u64(7));
    let controller = Controller::spawn(procedure);
    let server = RemoteServer::spawn(0, controller.sender(), wire_events).unwrap();
    (controller, server)
}

fn connect(server: &RemoteServer) -> (TcpStream, BufReader<TcpStream>) {
    let stream = TcpStream::connect(("127.0.0.1", server.port())).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let reader = BufReader::new(stream.try_clone().unwrap());
    (stream, reader)
}

fn read_line(reader: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    line.trim_end().to_string()
}

#[test]
fn start_runs_a_session_and_streams_the_wire_protocol() {
    let (controller, server) = start_stack(fast_config(2));
    let (mut stream, mut reader) = connect(&server);

    // Give the accept loop a moment to register the writer half.
    std::thread::sleep(Duration::from_millis(50));
    stream.write_all(b"start\n").unwrap();

    assert_eq!(read_line(&mut reader), "STR");

    let mut sets = 0;
    let mut results = 0;
    loop {
        let line = read_line(&mut reader);
        if line == "FIN" {
            break;
        }
        if line.starts_with("SET ") {
            sets += 1;
        } else if line.starts_with("RES ") {
            results += 1;
            let mut parts = line.split(' ');
            assert_eq!(parts.next(), Some("RES"));
            assert!(parts.next().is_some());
            assert!(matches!(parts.next(), Some("true") | Some("false")));
        }
    }
    assert_eq!(sets, 2);
    assert_eq!(results, 2);

    let status = controller.status().unwrap();
    assert!(!status.running);

    drop(stream);
    controller.send(ntask_engine::Command::Shutdown);
    controller.join();
}

#[test]
fn set_changes_the_next_start_only_while_inactive() {
    let mut config = fast_config(2);
    config.blank_screen_ms = 2_000;
    let (controller, server) = start_stack(config);
    let (mut stream, mut reader) = connect(&server);
    std::thread::sleep(Duration::from_millis(50));

    stream.write_all(b"set 2\n").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(controller.status().unwrap().setup_index, 2);

    stream.write_all(b"start\n").unwrap();
    assert_eq!(read_line(&mut reader), "STR");

    // Ignored while the run is live.
    stream.write_all(b"set 0\n").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    let status = controller.status().unwrap();
    assert!(status.running);
    assert_eq!(status.setup_index, 2);

    stream.write_all(b"stop\n").unwrap();
    loop {
        if read_line(&mut reader) == "FIN" {
            break;
        }
    }
    assert!(!controller.status().unwrap().running);

    drop(stream);
    controller.send(ntask_engine::Command::Shutdown);
    controller.join();
}

#[test]
fn unrecognized_lines_get_no_reply_and_do_not_kill_the_connection() {
    let (controller, server) = start_stack(fast_config(1));
    let (mut stream, mut reader) = connect(&server);
    std::thread::sleep(Duration::from_millis(50));

    stream.write_all(b"launch please\nset two\n\nstart\n").unwrap();
    assert_eq!(read_line(&mut reader), "STR");

    drop(stream);
    controller.send(ntask_engine::Command::Shutdown);
    controller.join();
}

#[test]
fn reconnecting_after_a_drop_is_served() {
    let mut config = fast_config(1);
    config.blank_screen_ms = 1_000;
    let (controller, server) = start_stack(config);

    // Both halves of the first connection must go away before the server
    // sees the disconnect and accepts again.
    let first = connect(&server);
    drop(first);

    let (mut stream, mut reader) = connect(&server);
    std::thread::sleep(Duration::from_millis(100));
    stream.write_all(b"start\n").unwrap();
    assert_eq!(read_line(&mut reader), "STR");

    drop(stream);
    controller.send(ntask_engine::Command::Shutdown);
    controller.join();
}

#[test]
fn a_restart_right_after_stop_is_not_held_behind_fin() {
    let mut config = fast_config(5);
    config.blank_screen_ms = 5_000;
    let (controller, server) = start_stack(config);
    let (mut stream, mut reader) = connect(&server);
    std::thread::sleep(Duration::from_millis(50));

    stream.write_all(b"start\n").unwrap();
    assert_eq!(read_line(&mut reader), "STR");

    // The FIN grace delay must not postpone the restarted run's output.
    stream.write_all(b"stop\nstart\n").unwrap();
    assert_eq!(read_line(&mut reader), "STR");
    assert_eq!(read_line(&mut reader), "FIN");

    drop(stream);
    controller.send(ntask_engine::Command::Shutdown);
    controller.join();
}

#[test]
fn exit_stops_the_run_and_terminates_the_controller() {
    let mut config = fast_config(5);
    config.blank_screen_ms = 5_000;
    let (controller, server) = start_stack(config);
    let (mut stream, mut reader) = connect(&server);
    std::thread::sleep(Duration::from_millis(50));

    stream.write_all(b"start\n").unwrap();
    assert_eq!(read_line(&mut reader), "STR");

    stream.write_all(b"exit\n").unwrap();
    assert_eq!(read_line(&mut reader), "FIN");

    // The controller thread ends; join must return promptly.
    controller.join();
}
