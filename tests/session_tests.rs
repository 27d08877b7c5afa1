//! Session Tests
//!
//! Full command exchanges against a scripted in-process server: each
//! test spawns a listener whose script asserts the requests it receives
//! and replies with canned responses.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use bytes::BytesMut;

use rqap::protocol::{
    decode_sexp, encode_sexp, CommandId, DT_BYTESTREAM, DT_INT, DT_SEXP, DT_STRING, ERR_R_ERROR,
};
use rqap::{QapError, Session, SessionConfig, Sexp};

// =============================================================================
// Scripted server
// =============================================================================

const NO_AUTH: [&[u8; 4]; 5] = [b"R411", b"    ", b"    ", b"    ", b"    "];

fn spawn_server<F>(script: F) -> (String, JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        script(stream);
    });
    (addr, handle)
}

fn id_block(chunks: [&[u8; 4]; 5]) -> [u8; 32] {
    let mut id = [0u8; 32];
    id[..12].copy_from_slice(b"Rsrv0103QAP1");
    for (i, chunk) in chunks.iter().enumerate() {
        id[12 + 4 * i..16 + 4 * i].copy_from_slice(*chunk);
    }
    id
}

fn send_id_block(stream: &mut TcpStream, chunks: [&[u8; 4]; 5]) {
    stream.write_all(&id_block(chunks)).unwrap();
}

struct Request {
    command: u32,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Request {
    let mut header = [0u8; 16];
    stream.read_exact(&mut header).unwrap();
    let field = |i: usize| u32::from_le_bytes(header[i..i + 4].try_into().unwrap());
    let len = field(4) as u64 | (field(12) as u64) << 32;
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).unwrap();
    Request {
        command: field(0),
        body,
    }
}

fn send_status(stream: &mut TcpStream, status: u32, body: &[u8]) {
    let mut packet = Vec::with_capacity(16 + body.len());
    packet.extend_from_slice(&status.to_le_bytes());
    packet.extend_from_slice(&(body.len() as u32).to_le_bytes());
    packet.extend_from_slice(&0u32.to_le_bytes());
    packet.extend_from_slice(&((body.len() as u64 >> 32) as u32).to_le_bytes());
    packet.extend_from_slice(body);
    stream.write_all(&packet).unwrap();
}

fn send_ok(stream: &mut TcpStream, body: &[u8]) {
    send_status(stream, 0x0001_0001, body);
}

fn send_error(stream: &mut TcpStream, code: u8, message: &[u8]) {
    send_status(stream, 0x0001_0002 | u32::from(code) << 24, message);
}

/// Wrap an encoded value in a parameter block, forming a response body.
fn sexp_body(value: &Sexp) -> Vec<u8> {
    let mut encoded = BytesMut::new();
    encode_sexp(value, &mut encoded);
    let mut body = vec![
        DT_SEXP,
        encoded.len() as u8,
        (encoded.len() >> 8) as u8,
        (encoded.len() >> 16) as u8,
    ];
    body.extend_from_slice(&encoded);
    body
}

/// The string argument at the front of a request body.
fn string_arg(body: &[u8]) -> &str {
    assert_eq!(body[0], DT_STRING);
    let len = body[1] as usize | (body[2] as usize) << 8 | (body[3] as usize) << 16;
    let content = &body[4..4 + len];
    let nul = content.iter().position(|&b| b == 0).unwrap();
    std::str::from_utf8(&content[..nul]).unwrap()
}

fn config_for(addr: String) -> SessionConfig {
    SessionConfig::builder().addr(addr).build()
}

// =============================================================================
// Connect and Evaluate
// =============================================================================

#[test]
fn test_connect_and_eval() {
    let (addr, server) = spawn_server(|mut stream| {
        send_id_block(&mut stream, NO_AUTH);
        let request = read_request(&mut stream);
        assert_eq!(request.command, CommandId::Eval as u32);
        assert_eq!(string_arg(&request.body), "rnorm(3)");
        send_ok(&mut stream, &sexp_body(&Sexp::doubles(vec![0.1, -1.2, 3.4])));
    });

    let mut session = Session::connect(&config_for(addr)).unwrap();
    assert_eq!(session.server_version(), "0103");
    let value = session.eval("rnorm(3)").unwrap();
    assert_eq!(value.as_doubles(), Some(&[0.1, -1.2, 3.4][..]));

    drop(session);
    server.join().unwrap();
}

#[test]
fn test_void_eval_set_encoding_and_remove() {
    let (addr, server) = spawn_server(|mut stream| {
        send_id_block(&mut stream, NO_AUTH);
        for (command, argument) in [
            (CommandId::VoidEval, "library(stats)"),
            (CommandId::SetEncoding, "utf8"),
            (CommandId::RemoveFile, "tmp.rds"),
        ] {
            let request = read_request(&mut stream);
            assert_eq!(request.command, command as u32);
            assert_eq!(string_arg(&request.body), argument);
            send_ok(&mut stream, &[]);
        }
    });

    let mut session = Session::connect(&config_for(addr)).unwrap();
    session.void_eval("library(stats)").unwrap();
    session.set_encoding("utf8").unwrap();
    session.remove_file("tmp.rds").unwrap();

    drop(session);
    server.join().unwrap();
}

#[test]
fn test_assign_sends_encoded_value() {
    let value = Sexp::doubles(vec![1.5, 2.5]).with_attribute("class", Sexp::string("speeds"));
    let expected = value.clone();

    let (addr, server) = spawn_server(move |mut stream| {
        send_id_block(&mut stream, NO_AUTH);
        let request = read_request(&mut stream);
        assert_eq!(request.command, CommandId::AssignSexp as u32);
        assert_eq!(string_arg(&request.body), "y");

        // Symbol block, then the value block.
        let name_len = request.body[1] as usize;
        let vstart = 4 + name_len;
        assert_eq!(request.body[vstart], DT_SEXP);
        let decoded = decode_sexp(&request.body[vstart + 4..]).unwrap();
        assert_eq!(decoded, expected);
        send_ok(&mut stream, &[]);
    });

    let mut session = Session::connect(&config_for(addr)).unwrap();
    session.assign("y", &value).unwrap();

    drop(session);
    server.join().unwrap();
}

// =============================================================================
// Authentication
// =============================================================================

#[test]
fn test_plaintext_login_preferred() {
    let (addr, server) = spawn_server(|mut stream| {
        send_id_block(&mut stream, [b"R411", b"ARpt", b"ARuc", b"Kqr ", b"    "]);
        let request = read_request(&mut stream);
        assert_eq!(request.command, CommandId::Login as u32);
        assert_eq!(string_arg(&request.body), "ana\nhunter2");
        send_ok(&mut stream, &[]);
    });

    let config = SessionConfig::builder()
        .addr(addr)
        .credentials("ana", "hunter2")
        .build();
    let session = Session::connect(&config).unwrap();

    drop(session);
    server.join().unwrap();
}

#[test]
fn test_crypt_login_runs_password_through_cipher() {
    fn fake_cipher(password: &str, salt: &str) -> String {
        format!("{}:{}", salt, password)
    }

    let (addr, server) = spawn_server(|mut stream| {
        send_id_block(&mut stream, [b"R411", b"ARuc", b"Kqr ", b"    ", b"    "]);
        let request = read_request(&mut stream);
        assert_eq!(request.command, CommandId::Login as u32);
        assert_eq!(string_arg(&request.body), "ana\nqr:hunter2");
        send_ok(&mut stream, &[]);
    });

    let config = SessionConfig::builder()
        .addr(addr)
        .credentials("ana", "hunter2")
        .cipher(fake_cipher)
        .build();
    let session = Session::connect(&config).unwrap();

    drop(session);
    server.join().unwrap();
}

#[test]
fn test_crypt_only_server_without_cipher_fails() {
    let (addr, server) = spawn_server(|mut stream| {
        send_id_block(&mut stream, [b"R411", b"ARuc", b"Kqr ", b"    ", b"    "]);
    });

    let config = SessionConfig::builder()
        .addr(addr)
        .credentials("ana", "hunter2")
        .build();
    let err = Session::connect(&config).unwrap_err();
    assert!(matches!(err, QapError::Unsupported(_)));

    server.join().unwrap();
}

#[test]
fn test_bad_handshake_magic_rejected() {
    let (addr, server) = spawn_server(|mut stream| {
        let mut id = id_block(NO_AUTH);
        id[0] = b'X';
        stream.write_all(&id).unwrap();
    });

    let err = Session::connect(&config_for(addr)).unwrap_err();
    assert!(matches!(err, QapError::Protocol(_)));

    server.join().unwrap();
}

// =============================================================================
// Error Handling
// =============================================================================

#[test]
fn test_server_error_surfaces_and_session_stays_usable() {
    let (addr, server) = spawn_server(|mut stream| {
        send_id_block(&mut stream, NO_AUTH);
        let _ = read_request(&mut stream);
        send_error(&mut stream, ERR_R_ERROR, b"object 'x' not found\0");
        let request = read_request(&mut stream);
        assert_eq!(request.command, CommandId::Eval as u32);
        send_ok(&mut stream, &sexp_body(&Sexp::integers(vec![2])));
    });

    let mut session = Session::connect(&config_for(addr)).unwrap();
    let err = session.eval("x").unwrap_err();
    assert!(matches!(err, QapError::Server { code: ERR_R_ERROR }));
    assert_eq!(err.to_string(), "Server error 0x45: R runtime error");

    // The error body was drained, so the next exchange lines up.
    let value = session.eval("1+1").unwrap();
    assert_eq!(value.as_integers(), Some(&[2][..]));

    drop(session);
    server.join().unwrap();
}

#[test]
fn test_connection_closed_mid_command() {
    let (addr, server) = spawn_server(|mut stream| {
        send_id_block(&mut stream, NO_AUTH);
        let _ = read_request(&mut stream);
        // Close without answering.
    });

    let mut session = Session::connect(&config_for(addr)).unwrap();
    let err = session.eval("Sys.sleep(60)").unwrap_err();
    assert!(matches!(err, QapError::Closed));

    server.join().unwrap();
}

// =============================================================================
// File Transfer
// =============================================================================

#[test]
fn test_read_file_streams_until_empty_chunk() {
    let (addr, server) = spawn_server(|mut stream| {
        send_id_block(&mut stream, NO_AUTH);

        let open = read_request(&mut stream);
        assert_eq!(open.command, CommandId::OpenFile as u32);
        assert_eq!(string_arg(&open.body), "results.csv");
        send_ok(&mut stream, &[]);

        let chunks: [&[u8]; 3] = [b"hello, ", b"world", b""];
        for chunk in chunks {
            let request = read_request(&mut stream);
            assert_eq!(request.command, CommandId::ReadFile as u32);
            // The client caps each chunk at its buffer size.
            assert_eq!(request.body[0], DT_INT);
            let limit = i32::from_le_bytes(request.body[4..8].try_into().unwrap());
            assert_eq!(limit, 16);
            send_ok(&mut stream, chunk);
        }

        let close = read_request(&mut stream);
        assert_eq!(close.command, CommandId::CloseFile as u32);
        send_ok(&mut stream, &[]);
    });

    let config = SessionConfig::builder().addr(addr).file_chunk_size(16).build();
    let mut session = Session::connect(&config).unwrap();
    assert_eq!(session.read_file("results.csv").unwrap(), b"hello, world");

    drop(session);
    server.join().unwrap();
}

#[test]
fn test_write_file_splits_content_into_chunks() {
    let (addr, server) = spawn_server(|mut stream| {
        send_id_block(&mut stream, NO_AUTH);

        let create = read_request(&mut stream);
        assert_eq!(create.command, CommandId::CreateFile as u32);
        assert_eq!(string_arg(&create.body), "data.bin");
        send_ok(&mut stream, &[]);

        let mut content = Vec::new();
        let mut blocks = 0;
        loop {
            let request = read_request(&mut stream);
            if request.command == CommandId::CloseFile as u32 {
                send_ok(&mut stream, &[]);
                break;
            }
            assert_eq!(request.command, CommandId::WriteFile as u32);
            assert_eq!(request.body[0], DT_BYTESTREAM);
            let len = request.body[1] as usize
                | (request.body[2] as usize) << 8
                | (request.body[3] as usize) << 16;
            content.extend_from_slice(&request.body[4..4 + len]);
            blocks += 1;
            send_ok(&mut stream, &[]);
        }
        assert_eq!(blocks, 3);
        assert_eq!(content, b"0123456789");
    });

    let config = SessionConfig::builder().addr(addr).file_chunk_size(4).build();
    let mut session = Session::connect(&config).unwrap();
    session.write_file("data.bin", b"0123456789").unwrap();

    drop(session);
    server.join().unwrap();
}

// =============================================================================
// Shutdown
// =============================================================================

#[test]
fn test_shutdown_consumes_the_session() {
    let (addr, server) = spawn_server(|mut stream| {
        send_id_block(&mut stream, NO_AUTH);
        let request = read_request(&mut stream);
        assert_eq!(request.command, CommandId::Shutdown as u32);
        assert!(request.body.is_empty());
        send_ok(&mut stream, &[]);
    });

    let session = Session::connect(&config_for(addr)).unwrap();
    session.shutdown().unwrap();

    server.join().unwrap();
}
