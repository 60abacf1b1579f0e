// tests/dev_server.rs

mod common;
use crate::common::{init_tracing, with_timeout, TestResult};

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration};

use sitepipe::serve::server::{inject_client, serve_on, RELOAD_PATH};
use sitepipe::serve::{ReloadHub, ServerHandle, ServerOptions};

#[test]
fn reload_client_goes_before_the_closing_body_tag() {
    let html = "<html><body><p>hi</p></BODY></html>";
    let out = inject_client(html, false);

    let script = out.find("<script>").expect("script injected");
    let body_end = out.find("</BODY>").expect("body kept");
    assert!(script < body_end);
    assert!(out.contains(RELOAD_PATH));
    assert!(out.ends_with("</BODY></html>"));
}

#[test]
fn reload_client_is_appended_to_fragments() {
    let out = inject_client("<p>fragment</p>", true);
    assert!(out.starts_with("<p>fragment</p><script>"));
    assert!(out.contains("sitepipe: reloading"));
}

async fn start_server(root: &Path, hub: &ReloadHub) -> Result<ServerHandle, Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let options = ServerOptions {
        root: root.to_path_buf(),
        port: 0,
        debug: true,
        notify: false,
    };
    Ok(serve_on(listener, options, hub.clone())?)
}

async fn request(handle: &ServerHandle, method: &str, target: &str) -> Result<String, Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect(handle.local_addr()).await?;
    stream
        .write_all(
            format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").as_bytes(),
        )
        .await?;
    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response)
}

fn header_value<'a>(response: &'a str, name: &str) -> Option<&'a str> {
    response
        .split("\r\n\r\n")
        .next()?
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
}

#[tokio::test]
async fn server_serves_files_with_the_reload_client() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("index.html"), "<html><body>home</body></html>")?;
    std::fs::create_dir_all(dir.path().join("css"))?;
    std::fs::write(dir.path().join("css/main.css"), "a{color:red}")?;

    let hub = ReloadHub::new();
    let server = start_server(dir.path(), &hub).await?;

    let page = with_timeout(request(&server, "GET", "/")).await?;
    assert!(page.starts_with("HTTP/1.1 200 OK"), "{page}");
    assert!(header_value(&page, "content-type").is_some_and(|v| v.starts_with("text/html")), "{page}");
    assert!(page.contains(RELOAD_PATH), "{page}");
    assert!(page.contains("home"), "{page}");

    let css = with_timeout(request(&server, "GET", "/css/main.css?v=3")).await?;
    assert!(css.ends_with("a{color:red}"), "{css}");
    assert!(!css.contains("<script>"));
    assert_eq!(header_value(&css, "cache-control"), Some("no-cache"));

    let head = with_timeout(request(&server, "HEAD", "/css/main.css")).await?;
    assert!(head.starts_with("HTTP/1.1 200 OK"), "{head}");
    assert!(head.ends_with("\r\n\r\n"), "{head}");

    let missing = with_timeout(request(&server, "GET", "/nope.html")).await?;
    assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");

    let escape = with_timeout(request(&server, "GET", "/../Cargo.toml")).await?;
    assert!(!escape.starts_with("HTTP/1.1 200"), "{escape}");

    let post = with_timeout(request(&server, "POST", "/")).await?;
    assert!(post.starts_with("HTTP/1.1 405"), "{post}");

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn server_resolves_directory_indexes_and_encoded_names() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("blog"))?;
    std::fs::write(dir.path().join("blog/index.html"), "<p>posts</p>")?;
    std::fs::write(dir.path().join("my page.txt"), "spaced")?;

    let hub = ReloadHub::new();
    let server = start_server(dir.path(), &hub).await?;

    let blog = with_timeout(request(&server, "GET", "/blog/")).await?;
    assert!(blog.starts_with("HTTP/1.1 200 OK"), "{blog}");
    assert!(blog.contains("<p>posts</p><script>"), "{blog}");

    let spaced = with_timeout(request(&server, "GET", "/my%20page.txt")).await?;
    assert!(spaced.ends_with("spaced"), "{spaced}");

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn reload_stream_emits_one_event_per_signal() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let hub = ReloadHub::new();
    let server = start_server(dir.path(), &hub).await?;

    let mut stream = TcpStream::connect(server.local_addr()).await?;
    stream
        .write_all(format!("GET {RELOAD_PATH} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
        .await?;
    let mut lines = BufReader::new(stream).lines();

    with_timeout(async {
        while hub.viewers() == 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert_eq!(hub.notify(), 1);

    let mut seen = Vec::new();
    with_timeout(async {
        while let Ok(Some(line)) = lines.next_line().await {
            let done = line.starts_with("data:");
            seen.push(line);
            if done {
                break;
            }
        }
    })
    .await;

    assert!(seen.iter().any(|l| l.contains("text/event-stream")), "{seen:?}");
    assert!(seen.iter().any(|l| l == "event: reload"), "{seen:?}");
    assert_eq!(seen.last().map(String::as_str), Some("data: 1"));

    server.shutdown();
    Ok(())
}
