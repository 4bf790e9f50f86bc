//! Seed conformance scenarios (A)-(F): each drives one slice of the stack
//! end to end against a scripted server, the way
//! `rust-legacy/rapace-core/tests/transport_conformance.rs` drives its
//! `run_*` scenarios over an in-memory transport instead of a real socket.

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use bolt_codec::framing::{encode_message, ChunkDecodeOutcome, ChunkDecoder, MAX_CHUNK_SIZE};
use bolt_codec::packstream::decode;
use bolt_session::{Session, SessionConfig};
use bolt_wire::value::{PropMap, Value};
use bolt_wire::{BoltError, BoltVersion, ErrorCode, Signature};

use bolt_conformance::{init_tracing, script_message, server_handshake, stream_pair};

fn failure_value(code: &str, message: &str) -> Value {
    Value::Map(PropMap::new(vec![
        (Arc::from("code"), Value::from(code)),
        (Arc::from("message"), Value::from(message)),
    ]))
}

// (A) RUN + PULL_ALL of a one-row result reports the field name, the row,
// the statement type and a row count of one.
#[tokio::test]
async fn scenario_a_run_and_pull_all_one_row_result() {
    init_tracing();
    let (client_io, mut server_io) = stream_pair(16 * 1024);

    let server_task = tokio::spawn(async move {
        server_handshake(&mut server_io, BoltVersion::V2).await;

        let mut init_response = Vec::new();
        script_message(&mut init_response, Signature::Success, &[Value::Map(PropMap::empty())], BoltVersion::V2);
        server_io.write_all(&init_response).await.unwrap();

        // RUN and PULL_ALL arrive back to back; drain whatever the client
        // has written so far and answer both in one shot.
        let mut scratch = [0u8; 4096];
        let _ = server_io.read(&mut scratch).await.unwrap();

        let mut response = Vec::new();
        let run_success = Value::Map(PropMap::new(vec![(Arc::from("fields"), Value::from(vec![Value::from("x")]))]));
        script_message(&mut response, Signature::Success, &[run_success], BoltVersion::V2);
        script_message(&mut response, Signature::Record, &[Value::from(vec![Value::Int(1)])], BoltVersion::V2);
        let pull_success = Value::Map(PropMap::new(vec![(Arc::from("type"), Value::from("r"))]));
        script_message(&mut response, Signature::Success, &[pull_success], BoltVersion::V2);
        server_io.write_all(&response).await.unwrap();
        server_io
    });

    let (session, _init_meta) = Session::connect(client_io, SessionConfig::default()).await.unwrap();

    let run_outcome = session.run("RETURN 1 AS x", Value::Null).await.unwrap();
    let mut stream = session.pull_all(Arc::from(vec![Arc::from("x")])).await.unwrap();
    let meta = run_outcome.await_fields().await.unwrap();
    assert_eq!(meta.fields, vec![Arc::from("x")]);

    assert_eq!(stream.n_fields(), 1);
    assert_eq!(stream.field_name(0).map(|s| s.as_ref()), Some("x"));

    let record = stream.fetch_next().await.unwrap().expect("one row expected");
    assert_eq!(record.get(0), Some(Value::Int(1)));
    assert!(stream.fetch_next().await.unwrap().is_none());

    assert_eq!(stream.count(), 1);
    assert_eq!(stream.statement_type(), Some(bolt_session::StatementType::ReadOnly));
    assert!(!stream.check_failure());

    server_task.await.unwrap();
}

// (B) A failure in the first of three pipelined statements cascades
// IGNORED onto everything queued behind it; `ack_failure` then clears the
// session so a subsequent statement succeeds normally.
#[tokio::test]
async fn scenario_b_failure_cascades_and_ack_failure_recovers() {
    init_tracing();
    let (client_io, mut server_io) = stream_pair(32 * 1024);

    let server_task = tokio::spawn(async move {
        server_handshake(&mut server_io, BoltVersion::V2).await;

        let mut init_response = Vec::new();
        script_message(&mut init_response, Signature::Success, &[Value::Map(PropMap::empty())], BoltVersion::V2);
        server_io.write_all(&init_response).await.unwrap();

        // RUN1, PULL1, RUN2, PULL2, RUN3, PULL3 — six pipelined messages.
        let mut scratch = [0u8; 8192];
        let _ = server_io.read(&mut scratch).await.unwrap();

        let mut response = Vec::new();
        script_message(
            &mut response,
            Signature::Failure,
            &[failure_value("Neo.ClientError.Statement.SyntaxError", "bad query")],
            BoltVersion::V2,
        );
        for _ in 0..5 {
            script_message(&mut response, Signature::Ignored, &[], BoltVersion::V2);
        }
        server_io.write_all(&response).await.unwrap();

        // ACK_FAILURE, then RUN4/PULL4 to confirm recovery.
        let mut scratch = [0u8; 4096];
        let _ = server_io.read(&mut scratch).await.unwrap();

        let mut recovery = Vec::new();
        script_message(&mut recovery, Signature::Success, &[Value::Map(PropMap::empty())], BoltVersion::V2);
        let run4_success = Value::Map(PropMap::new(vec![(Arc::from("fields"), Value::from(vec![Value::from("y")]))]));
        script_message(&mut recovery, Signature::Success, &[run4_success], BoltVersion::V2);
        let pull4_success = Value::Map(PropMap::empty());
        script_message(&mut recovery, Signature::Record, &[Value::from(vec![Value::Int(2)])], BoltVersion::V2);
        script_message(&mut recovery, Signature::Success, &[pull4_success], BoltVersion::V2);
        server_io.write_all(&recovery).await.unwrap();
        server_io
    });

    let (session, _init_meta) = Session::connect(client_io, SessionConfig::default()).await.unwrap();

    let run1 = session.run("RETURN 1", Value::Null).await.unwrap();
    let mut pull1 = session.pull_all(Arc::from(Vec::new())).await.unwrap();
    let run2 = session.run("RETURN 2", Value::Null).await.unwrap();
    let mut pull2 = session.pull_all(Arc::from(Vec::new())).await.unwrap();
    let run3 = session.run("RETURN 3", Value::Null).await.unwrap();
    let mut pull3 = session.pull_all(Arc::from(Vec::new())).await.unwrap();

    let err1 = run1.await_fields().await.unwrap_err();
    assert_eq!(err1.code(), ErrorCode::StatementFailed);
    assert!(session.is_poisoned());

    let pull1_err = pull1.fetch_next().await.unwrap_err();
    assert_eq!(pull1_err.code(), ErrorCode::SessionResetInProgress);
    assert!(pull1.check_failure());

    assert!(matches!(
        run2.await_fields().await.unwrap_err(),
        BoltError::Resource(ErrorCode::SessionResetInProgress)
    ));
    assert!(pull2.fetch_next().await.is_err());
    assert!(matches!(
        run3.await_fields().await.unwrap_err(),
        BoltError::Resource(ErrorCode::SessionResetInProgress)
    ));
    assert!(pull3.fetch_next().await.is_err());

    session.ack_failure().await.unwrap();
    assert!(!session.is_poisoned());

    let run4 = session.run("RETURN 2 AS y", Value::Null).await.unwrap();
    let meta = run4.await_fields().await.unwrap();
    assert_eq!(meta.fields, vec![Arc::from("y")]);
    let mut stream = session.pull_all(Arc::from(meta.fields)).await.unwrap();
    let record = stream.fetch_next().await.unwrap().unwrap();
    assert_eq!(record.get(0), Some(Value::Int(2)));

    server_task.await.unwrap();
}

// (C) Calling `reset` while a pull is blocked waiting on a record from a
// different task interrupts that pull with an IGNORED-derived error rather
// than hanging forever.
#[tokio::test]
async fn scenario_c_reset_interrupts_a_pending_pull_from_another_task() {
    init_tracing();
    let (client_io, mut server_io) = stream_pair(16 * 1024);

    let server_task = tokio::spawn(async move {
        server_handshake(&mut server_io, BoltVersion::V2).await;

        let mut init_response = Vec::new();
        script_message(&mut init_response, Signature::Success, &[Value::Map(PropMap::empty())], BoltVersion::V2);
        server_io.write_all(&init_response).await.unwrap();

        // RUN, then the client will send PULL_ALL followed by RESET.
        let mut scratch = [0u8; 4096];
        let _ = server_io.read(&mut scratch).await.unwrap();
        let mut run_response = Vec::new();
        let run_success = Value::Map(PropMap::new(vec![(Arc::from("fields"), Value::from(vec![Value::from("n")]))]));
        script_message(&mut run_response, Signature::Success, &[run_success], BoltVersion::V2);
        server_io.write_all(&run_response).await.unwrap();

        // Drain PULL_ALL and RESET together, then answer: IGNORED for the
        // interrupted pull (front of queue), SUCCESS for the reset itself.
        let mut scratch = [0u8; 4096];
        let _ = server_io.read(&mut scratch).await.unwrap();
        let mut reset_response = Vec::new();
        script_message(&mut reset_response, Signature::Ignored, &[], BoltVersion::V2);
        script_message(&mut reset_response, Signature::Success, &[Value::Map(PropMap::empty())], BoltVersion::V2);
        server_io.write_all(&reset_response).await.unwrap();
        server_io
    });

    let (session, _init_meta) = Session::connect(client_io, SessionConfig::default()).await.unwrap();

    let run_outcome = session.run("MATCH (n) RETURN n", Value::Null).await.unwrap();
    let meta = run_outcome.await_fields().await.unwrap();
    let mut stream = session.pull_all(Arc::from(meta.fields)).await.unwrap();

    let fetch_task = tokio::spawn(async move { stream.fetch_next().await });

    session.reset().await.unwrap();
    assert!(!session.is_reset_in_progress());

    let fetch_result = fetch_task.await.unwrap();
    assert!(fetch_result.is_err(), "the interrupted pull must surface an error, not hang");

    server_task.await.unwrap();
}

// (D) A FAILURE whose message carries a "line, column (offset)" suffix has
// that position parsed out and attached to the error the whole way through
// the session engine, not just at the metadata-extraction unit level.
#[tokio::test]
async fn scenario_d_failure_position_survives_the_session_dispatch_path() {
    init_tracing();
    let (client_io, mut server_io) = stream_pair(8 * 1024);

    let server_task = tokio::spawn(async move {
        server_handshake(&mut server_io, BoltVersion::V2).await;
        let mut init_response = Vec::new();
        script_message(&mut init_response, Signature::Success, &[Value::Map(PropMap::empty())], BoltVersion::V2);
        server_io.write_all(&init_response).await.unwrap();

        let mut scratch = [0u8; 4096];
        let _ = server_io.read(&mut scratch).await.unwrap();

        let mut response = Vec::new();
        script_message(
            &mut response,
            Signature::Failure,
            &[failure_value(
                "Neo.ClientError.Statement.SyntaxError",
                "Invalid input 'X': expected ... (line 3, column 5 (offset: 42))",
            )],
            BoltVersion::V2,
        );
        server_io.write_all(&response).await.unwrap();
        server_io
    });

    let (session, _init_meta) = Session::connect(client_io, SessionConfig::default()).await.unwrap();
    let run_outcome = session.run("RETURN X", Value::Null).await.unwrap();
    let err = run_outcome.await_fields().await.unwrap_err();

    match err {
        BoltError::Statement { code, details, .. } => {
            assert_eq!(code, "Neo.ClientError.Statement.SyntaxError");
            let details = details.expect("position suffix must be parsed into FailureDetails");
            assert_eq!(details.line, 3);
            assert_eq!(details.column, 5);
            assert_eq!(details.offset, 42);
        }
        other => panic!("expected a Statement failure with position details, got {other:?}"),
    }

    server_task.await.unwrap();
}

// (E) Path construction validation, pure in-memory: no socket involved,
// only the decoder rejecting a malformed PATH struct the way a peer that
// actually sent one over the wire would produce.
#[tokio::test]
async fn scenario_e_malformed_path_sequence_is_rejected_at_decode_time() {
    init_tracing();

    // One Node (id 0, no labels/props) and one UnboundRelationship (id 0,
    // type "KNOWS", no props), hand-encoded at the marker level so a
    // sequence that `Path::new` would never accept can still reach the
    // decoder, the way bytes from an adversarial/buggy peer would.
    fn node_bytes() -> Vec<u8> {
        vec![0xB3, Signature::Node.as_byte(), 0x00, 0x90, 0xA0]
    }

    fn unbound_rel_bytes() -> Vec<u8> {
        let mut out = vec![0xB3, Signature::UnboundRelationship.as_byte(), 0x00];
        out.push(0x80 | 5); // tiny string, length 5
        out.extend_from_slice(b"KNOWS");
        out.push(0xA0); // empty map
        out
    }

    fn path_bytes(sequence: &[i64]) -> Bytes {
        let mut out = BytesMut::new();
        out.put_u8(0xB3);
        out.put_u8(Signature::Path.as_byte());
        out.put_u8(0x90 | 1); // nodes: tiny list, length 1
        out.extend_from_slice(&node_bytes());
        out.put_u8(0x90 | 1); // rels: tiny list, length 1
        out.extend_from_slice(&unbound_rel_bytes());
        out.put_u8(0x90 | sequence.len() as u8); // sequence: tiny list
        for &i in sequence {
            assert!((-16..128).contains(&i), "test helper only encodes tiny ints");
            out.put_u8(i as i8 as u8);
        }
        out.freeze()
    }

    let odd_length = path_bytes(&[1]);
    let mut buf = odd_length.clone();
    let err = decode(&mut buf, BoltVersion::V2).unwrap_err();
    assert_eq!(err.code, ErrorCode::ProtocolViolation);
    assert!(err.detail.contains("odd length"), "got {err:?}");

    let zero_rel_index = path_bytes(&[0, 0]);
    let mut buf = zero_rel_index.clone();
    let err = decode(&mut buf, BoltVersion::V2).unwrap_err();
    assert_eq!(err.code, ErrorCode::ProtocolViolation);
    assert!(err.detail.contains("out of range"), "got {err:?}");
}

// (F) Chunking at the exact 65535/65536-byte boundary: a message that fits
// in one chunk stays one chunk, and the one byte that pushes it over the
// u16 ceiling spills into a second chunk rather than being dropped or
// corrupting the terminator.
#[tokio::test]
async fn scenario_f_chunking_at_the_65535_byte_boundary() {
    init_tracing();

    let exactly_max = vec![0xABu8; MAX_CHUNK_SIZE];
    let mut framed = BytesMut::new();
    encode_message(&exactly_max, MAX_CHUNK_SIZE, &mut framed);
    // One full chunk (2-byte length + payload) plus the empty terminator.
    assert_eq!(framed.len(), 2 + MAX_CHUNK_SIZE + 2);
    let mut cursor = framed.freeze();
    let len = u16::from_be_bytes([cursor[0], cursor[1]]) as usize;
    assert_eq!(len, MAX_CHUNK_SIZE);
    let mut decoder = ChunkDecoder::new(1 << 20);
    match decoder.poll(&mut cursor).unwrap() {
        ChunkDecodeOutcome::Message(m) => assert_eq!(m, exactly_max),
        other => panic!("expected Message, got {other:?}"),
    }
    assert!(cursor.is_empty());

    let one_over = vec![0xCDu8; MAX_CHUNK_SIZE + 1];
    let mut framed = BytesMut::new();
    encode_message(&one_over, MAX_CHUNK_SIZE, &mut framed);
    let framed = framed.freeze();

    let mut inspect = framed.clone();
    let first_len = u16::from_be_bytes([inspect[0], inspect[1]]) as usize;
    assert_eq!(first_len, MAX_CHUNK_SIZE, "first chunk must saturate at the u16 ceiling");
    inspect.advance(2 + first_len);
    let second_len = u16::from_be_bytes([inspect[0], inspect[1]]) as usize;
    assert_eq!(second_len, 1, "the one overflow byte spills into a second chunk");

    let mut decode_cursor = framed.clone();
    let mut decoder = ChunkDecoder::new(1 << 20);
    match decoder.poll(&mut decode_cursor).unwrap() {
        ChunkDecodeOutcome::Message(m) => assert_eq!(m, one_over),
        other => panic!("expected Message, got {other:?}"),
    }
}

// (G) A RUN-response SUCCESS missing its required `fields` list is a
// protocol violation end to end, not a silently empty result (§4.7).
#[tokio::test]
async fn scenario_g_run_success_missing_fields_is_a_protocol_violation() {
    init_tracing();
    let (client_io, mut server_io) = stream_pair(8 * 1024);

    let server_task = tokio::spawn(async move {
        server_handshake(&mut server_io, BoltVersion::V2).await;
        let mut init_response = Vec::new();
        script_message(&mut init_response, Signature::Success, &[Value::Map(PropMap::empty())], BoltVersion::V2);
        server_io.write_all(&init_response).await.unwrap();

        let mut scratch = [0u8; 4096];
        let _ = server_io.read(&mut scratch).await.unwrap();

        let mut response = Vec::new();
        // No `fields` key at all -- strict validation must reject this.
        script_message(&mut response, Signature::Success, &[Value::Map(PropMap::empty())], BoltVersion::V2);
        server_io.write_all(&response).await.unwrap();
        server_io
    });

    let (session, _init_meta) = Session::connect(client_io, SessionConfig::default()).await.unwrap();
    let run_outcome = session.run("RETURN 1", Value::Null).await.unwrap();
    let err = run_outcome.await_fields().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ProtocolViolation);

    server_task.await.unwrap();
}
