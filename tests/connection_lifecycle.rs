//! End-to-end connection handling over real TLS.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use hello_tls_server::net::{ConnectionError, ConnectionState};
use hello_tls_server::{ServeSummary, FIXED_RESPONSE};

mod common;

use common::{connect, drain_reports, exchange, start_server, TestServer};

#[tokio::test]
async fn bare_newline_gets_fixed_response() {
    let TestServer { server, addr, transcript, errors, shutdown, mut reports } = start_server().await;
    let stop = shutdown.subscribe();

    let (summary, response) = tokio::join!(server.run(stop), async {
        let response = exchange(addr, b"\n").await;
        shutdown.trigger();
        response
    });

    assert_eq!(response.unwrap(), FIXED_RESPONSE.as_bytes());
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.completed, 1);

    let reports = drain_reports(&mut reports);
    assert_eq!(reports[0].lines_read, 1);
    assert_eq!(reports[0].final_state, ConnectionState::Closed);

    let transcript = transcript.text();
    assert!(transcript.contains(&format!("*** Listening on port {}", addr.port())));
    assert!(transcript.contains("*** Receiving from the client:\n\n*** Receiving from the client finished"));
    assert!(transcript.contains("*** Sending to the client finished"));
    assert!(errors.text().is_empty(), "unexpected errors: {}", errors.text());
}

#[tokio::test]
async fn request_lines_are_echoed_before_response() {
    let TestServer { server, addr, transcript, shutdown, mut reports, .. } = start_server().await;
    let stop = shutdown.subscribe();
    let request = b"GET / HTTP/1.0\r\nHost: localhost\r\nUser-Agent: test\r\n\r\n";

    let (_, response) = tokio::join!(server.run(stop), async {
        let response = exchange(addr, request).await;
        shutdown.trigger();
        response
    });

    assert_eq!(response.unwrap(), FIXED_RESPONSE.as_bytes());
    let transcript = transcript.text();
    let echoed = transcript.find("GET / HTTP/1.0\r\nHost: localhost\r\nUser-Agent: test\r\n\r\n");
    let sending = transcript.find("*** Sending to the client:");
    assert!(echoed.is_some() && sending.is_some());
    assert!(echoed < sending);
    assert_eq!(drain_reports(&mut reports)[0].lines_read, 4);
}

#[tokio::test]
async fn failed_handshakes_do_not_stop_the_server() {
    let TestServer { server, addr, errors, shutdown, mut reports, .. } = start_server().await;
    let stop = shutdown.subscribe();

    let (summary, response) = tokio::join!(server.run(stop), async {
        // Close before sending anything.
        drop(TcpStream::connect(addr).await.unwrap());

        // Speak plaintext instead of TLS.
        let mut plain = TcpStream::connect(addr).await.unwrap();
        plain.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
        let mut sink = Vec::new();
        let _ = plain.read_to_end(&mut sink).await;

        let response = exchange(addr, b"\r\n").await;
        shutdown.trigger();
        response
    });

    assert_eq!(response.unwrap(), FIXED_RESPONSE.as_bytes());
    assert_eq!(
        summary,
        ServeSummary {
            accepted: 3,
            completed: 1,
            failed: 2,
            accept_errors: 0,
            residual_diagnostics: 0,
        }
    );

    let reports = drain_reports(&mut reports);
    assert!(matches!(reports[0].error, Some(ConnectionError::Handshake(_))));
    assert!(matches!(reports[1].error, Some(ConnectionError::Handshake(_))));
    assert!(reports[2].succeeded());
    assert_eq!(errors.text().matches("TLS handshaking error").count(), 2);
}

#[tokio::test]
async fn clean_close_without_terminator_still_gets_response() {
    let TestServer { server, addr, transcript, shutdown, mut reports, .. } = start_server().await;
    let stop = shutdown.subscribe();

    let (_, response) = tokio::join!(server.run(stop), async {
        let mut tls = connect(addr).await.unwrap();
        tls.write_all(b"GET / HTTP/1.0\r\n").await.unwrap();
        // Sends close_notify and half-closes; reading still works.
        tls.shutdown().await.unwrap();

        let mut response = Vec::new();
        let result = tls.read_to_end(&mut response).await.map(|_| response);
        shutdown.trigger();
        result
    });

    assert_eq!(response.unwrap(), FIXED_RESPONSE.as_bytes());
    let report = &drain_reports(&mut reports)[0];
    assert!(report.succeeded());
    assert_eq!(report.lines_read, 1);
    assert!(transcript.text().contains("GET / HTTP/1.0\r\n*** Receiving from the client finished"));
}

#[tokio::test]
async fn abrupt_disconnect_is_a_read_error() {
    let TestServer { server, addr, errors, shutdown, mut reports, .. } = start_server().await;
    let stop = shutdown.subscribe();

    let (summary, _) = tokio::join!(server.run(stop), async {
        let mut tls = connect(addr).await.unwrap();
        tls.write_all(b"GET / HTTP/1.0\r\n").await.unwrap();
        tls.flush().await.unwrap();
        // Let the server finish its side of the handshake and read the line.
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Drop the TCP stream without close_notify.
        let (tcp, _) = tls.into_inner();
        drop(tcp);

        let response = exchange(addr, b"\n").await;
        shutdown.trigger();
        response
    });

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 1);
    let reports = drain_reports(&mut reports);
    assert!(matches!(reports[0].error, Some(ConnectionError::Read(_))), "{:?}", reports[0].error);
    assert_eq!(reports[0].final_state, ConnectionState::Failed);
    assert!(errors.text().contains("error while reading data from the client"));
}

#[tokio::test]
async fn oversized_line_arrives_in_chunks() {
    let TestServer { server, addr, shutdown, mut reports, .. } = start_server().await;
    let stop = shutdown.subscribe();

    let mut request = vec![b'a'; 40_000];
    request.extend_from_slice(b"\n\n");

    let (_, response) = tokio::join!(server.run(stop), async {
        let response = exchange(addr, &request).await;
        shutdown.trigger();
        response
    });

    assert_eq!(response.unwrap(), FIXED_RESPONSE.as_bytes());
    // 16384 + 16384 + 7233 bytes, then the terminator.
    assert_eq!(drain_reports(&mut reports)[0].lines_read, 4);
}

#[tokio::test]
async fn connections_are_served_one_at_a_time() {
    let TestServer { server, addr, shutdown, .. } = start_server().await;
    let stop = shutdown.subscribe();

    let (summary, ()) = tokio::join!(server.run(stop), async {
        let mut first = connect(addr).await.unwrap();
        first.write_all(b"GET /first HTTP/1.0\r\n").await.unwrap();
        first.flush().await.unwrap();

        let second = tokio::spawn(exchange(addr, b"\n"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!second.is_finished(), "second client served while first was open");

        first.write_all(b"\r\n").await.unwrap();
        let mut response = Vec::new();
        first.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, FIXED_RESPONSE.as_bytes());

        let second = second.await.unwrap().unwrap();
        assert_eq!(second, FIXED_RESPONSE.as_bytes());
        shutdown.trigger();
    });

    assert_eq!(summary.completed, 2);
}

#[tokio::test]
async fn shutdown_stops_an_idle_server() {
    let TestServer { server, shutdown, .. } = start_server().await;
    let stop = shutdown.subscribe();

    let (summary, ()) = tokio::join!(server.run(stop), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();
    });

    assert_eq!(summary, ServeSummary::default());
}
