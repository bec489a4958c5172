use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;
use vireo::{HttpRequest, HttpResponse, Method, Router, Server};

fn hello(_: &HttpRequest) -> HttpResponse {
    HttpResponse::ok("Hello, World!")
}

fn echo_param(req: &HttpRequest) -> HttpResponse {
    let msg = req.get_path_param("msg").unwrap_or("missing");
    HttpResponse::ok(format!("Echo: {}", msg))
}

fn query_greeting(req: &HttpRequest) -> HttpResponse {
    let name = req.get_query_param("name").unwrap_or("stranger");
    HttpResponse::ok(format!("Hi {}", name))
}

fn upload(req: &HttpRequest) -> HttpResponse {
    HttpResponse::ok(format!("Received {} bytes", req.body.len()))
}

fn setup_test_server(addr: &'static str) {
    let mut router = Router::new();
    router.get("/hello", hello);
    router.get("/echo/{msg}", echo_param);
    router.get("/greet", query_greeting);
    router.post("/upload", upload);

    thread::spawn(move || {
        let server = Server::bind(addr).threads(2).keep_alive_timeout(1);
        server.serve(router).unwrap();
    });

    thread::sleep(Duration::from_millis(100));
}

fn read_full_response(stream: &mut TcpStream) -> String {
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut res = String::new();
    let _ = stream.read_to_string(&mut res);
    res
}

#[test]
fn exact_route_returns_expected_body() {
    setup_test_server("127.0.0.1:18181");

    let mut stream = TcpStream::connect("127.0.0.1:18181").unwrap();
    stream
        .write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .unwrap();
    let res = read_full_response(&mut stream);
    assert!(res.starts_with("HTTP/1.1 200 OK"));
    assert!(res.contains("Hello, World!"));
    assert!(res.contains("Connection: close"));
}

#[test]
fn parameterized_route_extracts_path_param() {
    setup_test_server("127.0.0.1:18182");

    let mut stream = TcpStream::connect("127.0.0.1:18182").unwrap();
    stream
        .write_all(b"GET /echo/test123 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .unwrap();
    let res = read_full_response(&mut stream);
    assert!(res.contains("Echo: test123"));
}

#[test]
fn query_string_is_decoded_into_params() {
    setup_test_server("127.0.0.1:18183");

    let mut stream = TcpStream::connect("127.0.0.1:18183").unwrap();
    stream
        .write_all(b"GET /greet?name=Ada+Lovelace HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .unwrap();
    let res = read_full_response(&mut stream);
    assert!(res.contains("Hi Ada Lovelace"));
}

#[test]
fn unknown_route_returns_404() {
    setup_test_server("127.0.0.1:18184");

    let mut stream = TcpStream::connect("127.0.0.1:18184").unwrap();
    stream
        .write_all(b"GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .unwrap();
    let res = read_full_response(&mut stream);
    assert!(res.starts_with("HTTP/1.1 404"));
    assert!(res.contains("Route not found"));
}

#[test]
fn post_body_split_across_writes_is_reassembled() {
    setup_test_server("127.0.0.1:18185");

    let mut stream = TcpStream::connect("127.0.0.1:18185").unwrap();
    stream
        .write_all(b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\nConnection: close\r\n\r\n")
        .unwrap();
    thread::sleep(Duration::from_millis(20));
    stream.write_all(b"hello").unwrap();

    let res = read_full_response(&mut stream);
    assert!(res.contains("Received 5 bytes"));
}

#[test]
fn keep_alive_connection_serves_multiple_requests() {
    setup_test_server("127.0.0.1:18186");

    let mut stream = TcpStream::connect("127.0.0.1:18186").unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    stream
        .write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .unwrap();
    let mut buf = [0u8; 4096];
    let n1 = stream.read(&mut buf).unwrap();
    let first = String::from_utf8_lossy(&buf[..n1]).to_string();
    assert!(first.contains("Hello, World!"));
    assert!(first.contains("Connection: keep-alive"));

    stream
        .write_all(b"GET /echo/again HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .unwrap();
    let res = read_full_response(&mut stream);
    assert!(res.contains("Echo: again"));
    assert!(res.contains("Connection: close"));
}

#[test]
fn idle_connection_is_closed_after_keep_alive_timeout() {
    setup_test_server("127.0.0.1:18187");

    let mut stream = TcpStream::connect("127.0.0.1:18187").unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(3))).unwrap();

    // No request sent; server's keep_alive_timeout is 1s. Wait past it and
    // expect the peer to have closed the connection (read returns 0).
    thread::sleep(Duration::from_millis(1500));
    let mut buf = [0u8; 16];
    let n = stream.read(&mut buf).unwrap_or(0);
    assert_eq!(n, 0);
}
