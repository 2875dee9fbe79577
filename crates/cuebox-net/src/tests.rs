//! Socket-level tests for the multiplexer, the auxiliary endpoint and the
//! client.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use cuebox_media::NullStore;
use cuebox_player::Player;
use cuebox_types::config::{PlayerConfig, ServerConfig};

use super::*;

/// Helper: find a free TCP port by binding to port 0 and releasing it.
fn free_port() -> u16 {
    let tmp = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = tmp.local_addr().unwrap().port();
    drop(tmp);
    port
}

fn start_server(player: &Player) -> ServerHandle {
    let config = ServerConfig {
        bind: "127.0.0.1".to_string(),
        port: free_port(),
        poll_interval_ms: 2,
        ..Default::default()
    };
    Server::bind(config, player.clone())
        .unwrap()
        .spawn()
        .unwrap()
}

fn connect(handle: &ServerHandle) -> Client {
    let client = Client::connect(&format!("127.0.0.1:{}", handle.port())).unwrap();
    client.set_timeout(Some(Duration::from_secs(2))).unwrap();
    client
}

fn raw_connect(port: u16) -> TcpStream {
    let stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    stream
}

fn read_lines(reader: &mut impl BufRead, count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert!(line.ends_with("\r\n"), "unterminated reply {line:?}");
            line.trim_end().to_string()
        })
        .collect()
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn idle_player() -> Player {
    Player::new(PlayerConfig::default())
}

// ---------------------------------------------------------------------------
// Command protocol
// ---------------------------------------------------------------------------

#[test]
fn add_then_status_over_tcp() {
    let player = Player::with_stores(
        PlayerConfig {
            idle_wait_ms: 5,
            ..Default::default()
        },
        vec![Box::new(NullStore::new())],
    );
    player.start().unwrap();
    let mut server = start_server(&player);
    let mut client = connect(&server);

    assert!(client.send(r#""test:" add"#).unwrap().is_empty());

    let mut status = Vec::new();
    wait_until(|| {
        status = client.send("status?").unwrap();
        status.len() == 3 && status[2] != "0"
    });
    assert_eq!(status[0], "1");
    assert!(status[1].parse::<i64>().unwrap() >= 0);
    assert_eq!(status[2], "250");

    server.stop();
    player.shutdown();
}

#[test]
fn errors_do_not_end_the_session() {
    let player = idle_player();
    let server = start_server(&player);
    let mut client = connect(&server);

    assert_eq!(
        client.send("drop").unwrap(),
        vec!["ERROR: stack underflow (drop)"]
    );
    assert_eq!(
        client.send(r#"add "open"#).unwrap().len(),
        1,
        "parse errors get a single error reply"
    );
    assert_eq!(client.send("1 .").unwrap(), vec!["1"]);
}

#[test]
fn output_lines_precede_ok() {
    let player = idle_player();
    let server = start_server(&player);
    let mut client = connect(&server);

    let lines = client.send("help").unwrap();
    assert!(lines.iter().any(|l| l == "Shell extensions:"));
    assert!(lines.iter().all(|l| !l.starts_with("ERROR")));
}

#[test]
fn lines_are_framed_by_crlf() {
    let player = idle_player();
    let server = start_server(&player);
    let mut stream = raw_connect(server.port());
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    stream.write_all(b"1 .\r\n2 .\r\n3 .").unwrap();
    assert_eq!(read_lines(&mut reader, 4), vec!["1", "OK", "2", "OK"]);

    stream.write_all(b"\r\n").unwrap();
    assert_eq!(read_lines(&mut reader, 2), vec!["3", "OK"]);

    // Empty lines are skipped without a reply.
    stream.write_all(b"\r\n\r\n4 .\r\n").unwrap();
    assert_eq!(read_lines(&mut reader, 2), vec!["4", "OK"]);
}

#[test]
fn small_reads_are_reassembled_per_connection() {
    let player = idle_player();
    let config = ServerConfig {
        bind: "127.0.0.1".to_string(),
        port: free_port(),
        aux_endpoint: false,
        poll_interval_ms: 2,
        read_chunk: 3,
    };
    let server = Server::bind(config, player).unwrap().spawn().unwrap();

    let mut a = raw_connect(server.port());
    let mut b = raw_connect(server.port());
    let mut a_reader = BufReader::new(a.try_clone().unwrap());
    let mut b_reader = BufReader::new(b.try_clone().unwrap());

    a.write_all(b"alpha ").unwrap();
    b.write_all(b"bravo ").unwrap();
    std::thread::sleep(Duration::from_millis(20));
    a.write_all(b".\r\n").unwrap();
    b.write_all(b".\r\n").unwrap();

    assert_eq!(read_lines(&mut a_reader, 2), vec!["alpha", "OK"]);
    assert_eq!(read_lines(&mut b_reader, 2), vec!["bravo", "OK"]);
}

#[test]
fn connections_have_separate_engines() {
    let player = idle_player();
    let server = start_server(&player);
    let mut a = connect(&server);
    let mut b = connect(&server);

    assert!(a.send("7").unwrap().is_empty());
    assert_eq!(b.send("depth .").unwrap(), vec!["0"]);
    assert_eq!(a.send("depth .").unwrap(), vec!["1"]);
}

#[test]
fn connections_share_the_player() {
    let player = idle_player();
    let server = start_server(&player);
    let mut a = connect(&server);
    let mut b = connect(&server);

    a.send("test: frames=10 add").unwrap();
    assert_eq!(b.send("playlist").unwrap(), vec!["test: fps=25 frames=10"]);
    assert_eq!(player.snapshot().playlist.len(), 1);
}

#[test]
fn disconnected_clients_are_released() {
    let player = idle_player();
    let server = start_server(&player);

    let a = connect(&server);
    let b = connect(&server);
    wait_until(|| server.connection_count() == 2);

    drop(a);
    wait_until(|| server.connection_count() == 1);
    drop(b);
    wait_until(|| server.connection_count() == 0);
}

#[test]
fn exit_closes_after_reply() {
    let player = idle_player();
    let server = start_server(&player);
    let mut client = connect(&server);

    assert!(client.send("exit").unwrap().is_empty());
    wait_until(|| server.connection_count() == 0);
    assert!(client.send("1 .").is_err());
}

#[test]
fn server_word_is_shell_only() {
    let player = idle_player();
    let server = start_server(&player);
    let mut client = connect(&server);

    assert_eq!(
        client.send("9000 server").unwrap(),
        vec!["ERROR: server 9000 is only available from the shell"]
    );
}

#[test]
fn stopped_server_refuses_connections() {
    let player = idle_player();
    let mut server = start_server(&player);
    let port = server.port();
    assert!(server.is_running());

    server.stop();
    assert!(!server.is_running());
    assert!(Client::connect(&format!("127.0.0.1:{port}")).is_err());
}

// ---------------------------------------------------------------------------
// Auxiliary endpoint
// ---------------------------------------------------------------------------

fn aux_request(server: &ServerHandle, request: &str) -> String {
    let mut stream = raw_connect(server.aux_port().unwrap());
    stream.write_all(request.as_bytes()).unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

#[test]
fn aux_endpoint_queues_item() {
    let player = idle_player();
    let server = start_server(&player);
    assert_eq!(server.aux_port(), Some(server.port() + 1));

    let response = aux_request(
        &server,
        "GET /?src=test%3A&frames=12 HTTP/1.0\r\nHost: localhost\r\n\r\n",
    );
    assert_eq!(response, "HTTP/1.0 204 No Content\r\n\r\n");

    let playlist = player.snapshot().playlist;
    assert_eq!(playlist.len(), 1);
    assert_eq!(playlist[0].frames(), 12);
}

#[test]
fn aux_endpoint_rejects_bad_requests() {
    let player = idle_player();
    let server = start_server(&player);

    let response = aux_request(&server, "GET /status HTTP/1.0\r\n\r\n");
    assert_eq!(response, "HTTP/1.0 400 Bad Request\r\n\r\n");
    let response = aux_request(&server, "GET /?src=nope%3Ax HTTP/1.0\r\n\r\n");
    assert_eq!(response, "HTTP/1.0 400 Bad Request\r\n\r\n");
    assert!(player.snapshot().playlist.is_empty());
}

#[test]
fn aux_endpoint_survives_pending_words() {
    let player = idle_player();
    let server = start_server(&player);

    let response = aux_request(&server, "GET /?src=store HTTP/1.0\r\n\r\n");
    assert_eq!(response, "HTTP/1.0 400 Bad Request\r\n\r\n");

    let response = aux_request(
        &server,
        "GET /?src=test%3A&frames=12 HTTP/1.0\r\n\r\n",
    );
    assert_eq!(response, "HTTP/1.0 204 No Content\r\n\r\n");
    assert_eq!(player.snapshot().playlist.len(), 1);
}

#[test]
fn aux_endpoint_can_be_disabled() {
    let player = idle_player();
    let config = ServerConfig {
        bind: "127.0.0.1".to_string(),
        port: free_port(),
        aux_endpoint: false,
        ..Default::default()
    };
    let server = Server::bind(config, player).unwrap();
    assert!(server.aux_addr().is_none());
    assert_eq!(server.connection_count(), 0);
}
