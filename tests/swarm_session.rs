//! Integration tests for the full swarm session pipeline.
//!
//! Each test runs a real [`SwarmSession`] against scripted fake drones
//! bound on loopback addresses (127.0.0.2, 127.0.0.3, …), with its own
//! port set so the tests can run in parallel:
//! - full deadhead run with exact command transcripts
//! - error-ack exclusion of a single unit
//! - proximity-guard forced landing
//! - follow-to-end flight driven by scripted telemetry

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

use tello_swarm::{
    DeadheadConfig, DeadheadNTimes, FollowConfig, FollowToEndPad, SessionConfig, SwarmSession,
};

const RUN_TIMEOUT: Duration = Duration::from_secs(20);

fn session_config(control: u16, telemetry: u16, local: u16, poll_ms: u64) -> SessionConfig {
    SessionConfig {
        control_port: control,
        telemetry_port: telemetry,
        local_port: local,
        range_threshold_mm: 500,
        range_poll_ms: poll_ms,
        range_reply_timeout_ms: 500,
    }
}

/// A scripted drone on the control port. Records every command it
/// receives and answers with whatever the reply function returns.
struct FakeDrone {
    commands: Arc<Mutex<Vec<String>>>,
}

impl FakeDrone {
    async fn spawn<F>(ip: IpAddr, control_port: u16, reply: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        // Bind before returning so the session's first datagram cannot
        // beat the drone to the port.
        let socket = UdpSocket::bind((ip, control_port)).await.unwrap();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&commands);
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            loop {
                let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let command = String::from_utf8_lossy(&buf[..len]).to_string();
                log.lock().unwrap().push(command.clone());
                let _ = socket.send_to(reply(&command).as_bytes(), from).await;
            }
        });
        Self { commands }
    }

    /// Commands received so far, without proximity polls.
    fn transcript(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| *c != "EXT tof?")
            .cloned()
            .collect()
    }
}

fn always_ok(command: &str) -> String {
    if command == "EXT tof?" {
        "tof 1500".to_string()
    } else {
        "ok".to_string()
    }
}

#[tokio::test]
async fn test_deadhead_swarm_completes_with_exact_transcripts() {
    let a: IpAddr = "127.0.0.2".parse().unwrap();
    let b: IpAddr = "127.0.0.3".parse().unwrap();
    let drone_a = FakeDrone::spawn(a, 43811, always_ok).await;
    let drone_b = FakeDrone::spawn(b, 43811, always_ok).await;

    let strategy = Arc::new(DeadheadNTimes::new(DeadheadConfig {
        hops: 2,
        distance_cm: 100,
        speed_cms: 50,
    }));
    // Guard polls far apart so the transcripts stay deterministic.
    let config = session_config(43811, 43812, 43813, 60_000);

    let session = SwarmSession::new(vec![a, b], strategy, config)
        .await
        .unwrap();
    timeout(RUN_TIMEOUT, session.run())
        .await
        .expect("session should complete")
        .expect("session should succeed");

    let expected = |label: char| {
        vec![
            "command".to_string(),
            "takeoff".to_string(),
            format!("EXT mled s r {label}"),
            "go 100 0 0 50".to_string(),
            "go 100 0 0 50".to_string(),
            "land".to_string(),
        ]
    };
    assert_eq!(drone_a.transcript(), expected('a'));
    assert_eq!(drone_b.transcript(), expected('b'));
}

#[tokio::test]
async fn test_error_ack_excludes_unit_but_swarm_completes() {
    let a: IpAddr = "127.0.0.2".parse().unwrap();
    let b: IpAddr = "127.0.0.3".parse().unwrap();
    let drone_a = FakeDrone::spawn(a, 43821, always_ok).await;
    let drone_b = FakeDrone::spawn(b, 43821, |command| {
        if command == "takeoff" {
            "error Motor stop".to_string()
        } else {
            always_ok(command)
        }
    })
    .await;

    let strategy = Arc::new(DeadheadNTimes::new(DeadheadConfig {
        hops: 1,
        distance_cm: 100,
        speed_cms: 50,
    }));
    let config = session_config(43821, 43822, 43823, 60_000);

    let session = SwarmSession::new(vec![a, b], strategy, config)
        .await
        .unwrap();
    timeout(RUN_TIMEOUT, session.run())
        .await
        .expect("session should complete")
        .expect("one bad unit must not fail the session");

    // The erroring unit is dropped right after the failed takeoff.
    assert_eq!(drone_b.transcript(), vec!["command", "takeoff"]);
    assert_eq!(
        drone_a.transcript(),
        vec![
            "command",
            "takeoff",
            "EXT mled s r a",
            "go 100 0 0 50",
            "land",
        ]
    );
}

#[tokio::test]
async fn test_proximity_guard_forces_landing() {
    let a: IpAddr = "127.0.0.2".parse().unwrap();
    // No telemetry, so the strategy searches forever; only the guard can
    // end this run.
    let drone = FakeDrone::spawn(a, 43831, |command| {
        if command == "EXT tof?" {
            "tof 300".to_string()
        } else {
            "ok".to_string()
        }
    })
    .await;

    let strategy = Arc::new(FollowToEndPad::new(FollowConfig::default()));
    let config = session_config(43831, 43832, 43833, 100);

    let session = SwarmSession::new(vec![a], strategy, config).await.unwrap();
    timeout(RUN_TIMEOUT, session.run())
        .await
        .expect("guard should end the session")
        .expect("forced landing is a success");

    // The land datagram can still be in flight when the session resolves;
    // give the fake drone a moment to log it.
    for _ in 0..50 {
        if drone.transcript().iter().any(|c| c == "land") {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("guard must land the unit: {:?}", drone.transcript());
}

#[tokio::test]
async fn test_follow_to_end_lands_on_the_end_pad() {
    let a: IpAddr = "127.0.0.2".parse().unwrap();
    let control_port = 43841;
    let telemetry_port = 43842;

    fn state_line(mid: i32, x: i32, y: i32, yaw: i32) -> String {
        format!(
            "mid:{mid};x:{x};y:{y};z:-60;mpry:0,0,{yaw};pitch:0;roll:0;yaw:{yaw};\
             vgx:0;vgy:0;vgz:0;templ:60;temph:62;tof:70;h:50;bat:85;\
             baro:163.12;time:0;agx:4.00;agy:-3.00;agz:-998.00;"
        )
    }

    // Deliver a state line a few times, spaced out, so the session has
    // decoded it before the drone acks the command that caused it.
    async fn send_state(socket: &UdpSocket, line: &str, dst: SocketAddr) {
        for _ in 0..3 {
            let _ = socket.send_to(line.as_bytes(), dst).await;
            sleep(Duration::from_millis(20)).await;
        }
    }

    // Scripted drone: each milestone command updates what the "camera"
    // sees, and the new state line is delivered before the ack so the
    // next strategy decision observes it.
    let control = UdpSocket::bind((a, control_port)).await.unwrap();
    let telemetry_tx = UdpSocket::bind((a, 0)).await.unwrap();
    let commands = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&commands);
    tokio::spawn(async move {
        let telemetry_dst = SocketAddr::from(([127, 0, 0, 1], telemetry_port));
        let mut buf = [0u8; 1024];
        loop {
            let Ok((len, from)) = control.recv_from(&mut buf).await else {
                return;
            };
            let command = String::from_utf8_lossy(&buf[..len]).to_string();
            log.lock().unwrap().push(command.clone());
            match command.as_str() {
                // Airborne over the first path pad, already yaw-aligned.
                "takeoff" => {
                    send_state(&telemetry_tx, &state_line(1, 0, 0, 0), telemetry_dst).await
                }
                // The hop put us over the end pad, 40 mm off center.
                "go 380 0 50 50 m1" => {
                    send_state(&telemetry_tx, &state_line(5, 40, 0, 0), telemetry_dst).await
                }
                // The centering nudge landed within tolerance.
                "go 0 0 50 50 m5" => {
                    send_state(&telemetry_tx, &state_line(5, 3, -4, 0), telemetry_dst).await
                }
                _ => {}
            }
            let _ = control.send_to(b"ok", from).await;
        }
    });

    let strategy = Arc::new(FollowToEndPad::new(FollowConfig::default()));
    let config = session_config(control_port, telemetry_port, 43843, 60_000);

    let session = SwarmSession::new(vec![a], strategy, config).await.unwrap();
    timeout(RUN_TIMEOUT, session.run())
        .await
        .expect("session should complete")
        .expect("session should succeed");

    assert_eq!(
        *commands.lock().unwrap(),
        vec![
            "command",
            "takeoff",
            "EXT mled s r a",
            "go 380 0 50 50 m1",
            "go 0 0 50 50 m5",
            "land",
        ]
    );
}
