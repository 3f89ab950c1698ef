// Session against the mock emulator

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use emunwa_common::{ClientConfig, Request};
use emunwa_gui_core::{
    Action, AppCore, EmuEventHandler, SelfTestOutcome, Session, EXPECTED_READOUT,
};
use emunwa_mock_server::{MockEmulator, MockServer, SharedEmulator};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

#[derive(Default)]
struct Recorder {
    statuses: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    successes: Mutex<Vec<String>>,
    view: Mutex<Option<AppCore>>,
}

impl EmuEventHandler for Recorder {
    fn on_status_message(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }

    fn on_error(&self, error: &str) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn on_success(&self, message: &str) {
        self.successes.lock().unwrap().push(message.to_string());
    }

    fn on_view_changed(&self, core: &AppCore) {
        *self.view.lock().unwrap() = Some(core.clone());
    }
}

impl Recorder {
    fn last_status(&self) -> Option<String> {
        self.statuses.lock().unwrap().last().cloned()
    }

    fn view(&self) -> AppCore {
        self.view.lock().unwrap().clone().unwrap_or_default()
    }
}

async fn start_server() -> (SocketAddr, SharedEmulator) {
    let server = MockServer::bind("127.0.0.1:0", MockEmulator::default())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let emulator = server.emulator();
    tokio::spawn(server.run());
    (addr, emulator)
}

fn session_for(addr: SocketAddr, recorder: &Arc<Recorder>) -> Session {
    let config = ClientConfig {
        port: addr.port(),
        poll_interval_ms: 50,
        ..Default::default()
    };
    Session::new(config, recorder.clone())
}

async fn connect(session: &mut Session, addr: SocketAddr) {
    session
        .dispatch(Action::ToggleConnection {
            host: addr.ip().to_string(),
        })
        .await;
    session.drain(Duration::from_secs(5)).await.unwrap();
}

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_connect_populates_view() {
    let (addr, emulator) = start_server().await;
    let recorder = Arc::new(Recorder::default());
    let mut session = session_for(addr, &recorder);

    connect(&mut session, addr).await;

    let statuses = recorder.statuses.lock().unwrap().clone();
    assert_eq!(statuses, vec!["Connecting ...", "Connected"]);

    let core = session.core();
    assert!(core.is_connected());
    assert!(session.is_polling());
    assert!(core.emulator_label.starts_with("name:emunwa-mock, version:"));
    let labels: Vec<String> = core.cores.iter().map(|c| c.label()).collect();
    assert_eq!(labels, vec!["[SNES] snes9x", "[GB] gambatte"]);
    assert_eq!(core.read_memories, vec!["WRAM", "SRAM", "CARTROM"]);
    assert_eq!(core.write_memories, vec!["WRAM", "SRAM"]);
    assert!(core.read_write_test_available);

    let emulator = emulator.lock().await;
    assert_eq!(emulator.client_name(), Some("emunwa"));
}

#[tokio::test]
async fn test_game_and_status_flow() {
    let (addr, _) = start_server().await;
    let recorder = Arc::new(Recorder::default());
    let mut session = session_for(addr, &recorder);
    connect(&mut session, addr).await;

    session
        .dispatch(Action::LoadGame("/roms/Test Game (Europe).sfc".into()))
        .await;
    session.drain(TIMEOUT).await.unwrap();
    assert_eq!(
        recorder.last_status().as_deref(),
        Some("State: running, Game: Test Game (Europe) [Europe]")
    );

    session.dispatch(Action::EmuPause).await;
    session.drain(TIMEOUT).await.unwrap();
    assert_eq!(
        recorder.last_status().as_deref(),
        Some("State: paused, Game: Test Game (Europe) [Europe]")
    );
    assert!(recorder.errors.lock().unwrap().is_empty());

    session.dispatch(Action::CoreReset).await;
    session.drain(TIMEOUT).await.unwrap();
    assert_eq!(session.core().last_emu_state, "running");
}

#[tokio::test]
async fn test_self_test_passes() {
    let (addr, _) = start_server().await;
    let recorder = Arc::new(Recorder::default());
    let mut session = session_for(addr, &recorder);
    connect(&mut session, addr).await;

    let outcome = emunwa_gui_core::selftest::run(&mut session).await.unwrap();
    assert_eq!(outcome, SelfTestOutcome::Passed);
    assert_eq!(session.core().readout, EXPECTED_READOUT);
    assert!(!session.core().append_reads);

    session.dispatch(Action::ReadWriteTest).await;
    assert_eq!(
        *recorder.successes.lock().unwrap(),
        vec!["Read/write tests succeeded!"]
    );
}

#[tokio::test]
async fn test_self_test_without_connection() {
    let recorder = Arc::new(Recorder::default());
    let mut session = Session::new(ClientConfig::default(), recorder.clone());

    let outcome = emunwa_gui_core::selftest::run(&mut session).await.unwrap();
    assert_eq!(outcome, SelfTestOutcome::NotConnected);
}

#[tokio::test]
async fn test_core_switch_and_memory_access() {
    let (addr, _) = start_server().await;
    let recorder = Arc::new(Recorder::default());
    let mut session = session_for(addr, &recorder);
    connect(&mut session, addr).await;

    session.dispatch(Action::SelectCore(Some(1))).await;
    session.dispatch(Action::LoadCore).await;
    assert!(session.core().read_memories.is_empty());
    session.drain(TIMEOUT).await.unwrap();
    assert_eq!(session.core().read_memories, vec!["WRAM", "HRAM"]);

    session
        .dispatch(Action::Write {
            memory: "HRAM".into(),
            addresses: "$7e".into(),
            data: "12 34".into(),
        })
        .await;
    session
        .dispatch(Action::Read {
            memory: "HRAM".into(),
            addresses: "-$2;2".into(),
        })
        .await;
    session.drain(TIMEOUT).await.unwrap();
    assert_eq!(session.core().readout, "00 12");

    session
        .dispatch(Action::Read {
            memory: "VRAM".into(),
            addresses: String::new(),
        })
        .await;
    session.drain(TIMEOUT).await.unwrap();
    assert_eq!(
        *recorder.errors.lock().unwrap(),
        vec!["Unknown memory: 'VRAM'"]
    );

    session
        .dispatch(Action::Write {
            memory: "HRAM".into(),
            addresses: "$0".into(),
            data: "xyz".into(),
        })
        .await;
    assert_eq!(recorder.errors.lock().unwrap().len(), 2);

    session.dispatch(Action::UnloadCore).await;
    session.drain(TIMEOUT).await.unwrap();
    assert!(session.core().read_memories.is_empty());
    assert!(!session.core().read_write_test_available);
}

#[tokio::test]
async fn test_disconnect_and_connect_error() {
    let (addr, _) = start_server().await;
    let recorder = Arc::new(Recorder::default());
    let mut session = session_for(addr, &recorder);
    connect(&mut session, addr).await;

    session
        .dispatch(Action::ToggleConnection {
            host: addr.ip().to_string(),
        })
        .await;
    assert_eq!(recorder.last_status().as_deref(), Some("Disconnected"));
    assert!(!session.is_polling());
    assert!(session.core().cores.is_empty());
    assert!(session.core().read_memories.is_empty());

    // Actions while disconnected are dropped
    session.dispatch(Action::EmuInfo).await;
    assert_eq!(recorder.last_status().as_deref(), Some("Disconnected"));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed = listener.local_addr().unwrap();
    drop(listener);

    let mut session = session_for(closed, &recorder);
    connect(&mut session, closed).await;
    let status = recorder.last_status().unwrap();
    assert!(status.starts_with("Error: "), "status was {:?}", status);
    assert!(!session.core().is_connected());
}

#[tokio::test]
async fn test_server_dropping_connection() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 256];
        while !String::from_utf8_lossy(&received).contains("CORE_MEMORIES\n") {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0);
            received.extend_from_slice(&buf[..n]);
        }
        // Answer MY_NAME_IS, EMU_INFO and CORES_LIST, then hang up
        socket
            .write_all(b"\n\n\nname:bsnes\nversion:115\n\n\nplatform:SNES\nname:bsnes\n\n")
            .await
            .unwrap();
    });

    let recorder = Arc::new(Recorder::default());
    let mut session = session_for(addr, &recorder);
    connect(&mut session, addr).await;

    let statuses = recorder.statuses.lock().unwrap().clone();
    assert_eq!(statuses[..2], ["Connecting ...", "Connected"]);
    assert_eq!(
        statuses.last().map(String::as_str),
        Some("Disconnected: remote host closed the connection")
    );

    let core = session.core();
    assert!(!core.is_connected());
    assert!(!session.is_polling());
    assert!(core.cores.is_empty());
    assert!(core.emulator_label.is_empty());
    assert!(core.read_memories.is_empty());
}

#[tokio::test]
async fn test_oversized_write_keeps_connection() {
    let (addr, _) = start_server().await;
    let recorder = Arc::new(Recorder::default());
    let mut session = session_for(addr, &recorder);
    connect(&mut session, addr).await;

    session
        .dispatch(Action::Write {
            memory: "WRAM".into(),
            addresses: "$0".into(),
            data: "00".repeat(emunwa_common::MAX_BINARY_LEN + 1),
        })
        .await;
    assert_eq!(recorder.errors.lock().unwrap().len(), 1);
    assert!(session.core().is_connected());
    assert!(session.is_polling());

    session.dispatch(Action::EmuInfo).await;
    session.drain(TIMEOUT).await.unwrap();
    assert_eq!(session.core().last_emu_state, "stopped");
}

#[tokio::test]
async fn test_run_loop_polls_status() {
    let (addr, emulator) = start_server().await;
    let recorder = Arc::new(Recorder::default());
    let mut session = session_for(addr, &recorder);
    let (tx, rx) = mpsc::unbounded_channel();

    let driver = async {
        tx.send(Action::ToggleConnection {
            host: addr.ip().to_string(),
        })
        .unwrap();
        tx.send(Action::LoadGame("/roms/Demo.sfc".into())).unwrap();
        wait_for(&recorder, |core| core.last_emu_state == "running").await;

        // Change state behind the session's back; the poll picks it up
        emulator.lock().await.execute(&Request {
            keyword: "EMU_PAUSE".into(),
            args: None,
            data: None,
        });
        wait_for(&recorder, |core| core.last_emu_state == "paused").await;

        tx.send(Action::Quit).unwrap();
    };

    let (result, ()) = tokio::join!(session.run(rx), driver);
    result.unwrap();
    assert!(!session.client().is_connected());
    assert_eq!(
        recorder.last_status().as_deref(),
        Some("State: paused, Game: Demo")
    );
}

async fn wait_for(recorder: &Recorder, condition: impl Fn(&AppCore) -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            if condition(&recorder.view()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
