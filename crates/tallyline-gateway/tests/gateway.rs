//! End-to-end: producers over TCP, scrapes over HTTP/1.1.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use tallyline_core::{ErrorKind, MetricId};
use tallyline_gateway::config::{self, GatewayConfig};
use tallyline_gateway::ingest;
use tallyline_gateway::obs::{MetricRegistry, SampleValue};
use tallyline_gateway::runtime::Gateway;

const CONFIG: &str = r#"
version: 1
scrape:
  listen: "127.0.0.1:0"
  path: "/prometheus"
listeners:
  - name: "prodcons"
    listen: "127.0.0.1:0"
    labels: { name: "cuong" }
    counter: "tmp_count"
    fields:
      - { gauge: "cur_prod_rate" }
      - { gauge: "cur_prod_count" }
      - { gauge: "cur_cons_count" }
      - { gauge: "cur_queue_size" }
      - { gauge: "queue_size_threshold" }
  - name: "acks"
    listen: "127.0.0.1:0"
    mode: "echo-ack"
    labels: { app: "observer" }
    counter: "ack_lines"
    fields:
      - { gauge: "cur_read_count" }
      - { gauge: "cur_write_count" }
      - { gauge: "cur_queue_size", kind: "decimal" }
"#;

fn test_config() -> GatewayConfig {
    config::load_from_str(CONFIG).unwrap()
}

fn cuong(name: &str) -> MetricId {
    MetricId::new(name, [("name", "cuong")]).unwrap()
}

fn counter(reg: &MetricRegistry, id: &MetricId) -> u64 {
    match reg.value_of(id) {
        Some(SampleValue::Counter(v)) => v,
        other => panic!("{id}: {other:?}"),
    }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

struct HttpReply {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl HttpReply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

async fn http_get(addr: SocketAddr, path: &str) -> HttpReply {
    let mut s = TcpStream::connect(addr).await.unwrap();
    let req = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    s.write_all(req.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    s.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").expect("no header terminator");
    let mut lines = head.lines();
    let status = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .expect("bad status line");
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    HttpReply {
        status,
        headers,
        body: body.to_string(),
    }
}

#[tokio::test]
async fn pushed_line_shows_up_in_scrape() {
    let gw = Gateway::start(test_config()).await.unwrap();
    let reg = gw.registry();

    let mut producer = TcpStream::connect(gw.listener_addr("prodcons").unwrap()).await.unwrap();
    producer.write_all(b"12:100:90:5:10\n").await.unwrap();
    wait_until("line applied", || counter(&reg, &cuong("tmp_count")) == 1).await;

    let reply = http_get(gw.scrape_addr(), "/prometheus").await;
    assert_eq!(reply.status, 200);
    assert_eq!(
        reply.header("content-length").map(|v| v.parse::<usize>().unwrap()),
        Some(reply.body.len())
    );
    assert!(reply.header("content-type").unwrap().starts_with("text/plain; version=0.0.4"));

    for line in [
        "# TYPE cur_prod_rate gauge",
        "cur_prod_rate{name=\"cuong\"} 12",
        "cur_prod_count{name=\"cuong\"} 100",
        "cur_cons_count{name=\"cuong\"} 90",
        "cur_queue_size{name=\"cuong\"} 5",
        "queue_size_threshold{name=\"cuong\"} 10",
        "# TYPE tmp_count counter",
        "tmp_count{name=\"cuong\"} 1",
        "tallyline_connections_accepted_total{listener=\"prodcons\"} 1",
    ] {
        assert!(reply.body.lines().any(|l| l == line), "missing {line:?} in\n{}", reply.body);
    }

    drop(producer);
    gw.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_line_is_logged_not_applied() {
    let gw = Gateway::start(test_config()).await.unwrap();
    let reg = gw.registry();
    let failures = MetricId::new("tallyline_parse_failures_total", [("listener", "prodcons")]).unwrap();

    let mut producer = TcpStream::connect(gw.listener_addr("prodcons").unwrap()).await.unwrap();
    producer.write_all(b"12:100\n\n").await.unwrap();
    wait_until("parse failure", || counter(&reg, &failures) == 1).await;

    // same connection keeps working
    producer.write_all(b"1:2:3:4:5\n").await.unwrap();
    wait_until("line applied", || counter(&reg, &cuong("tmp_count")) == 1).await;
    assert_eq!(reg.value_of(&cuong("cur_prod_rate")), Some(SampleValue::Gauge(1.0)));

    gw.shutdown().await.unwrap();
}

#[tokio::test]
async fn many_producers_count_every_valid_line_once() {
    const PRODUCERS: u64 = 8;
    const LINES: u64 = 250;

    let gw = Gateway::start(test_config()).await.unwrap();
    let reg = gw.registry();
    let addr = gw.listener_addr("prodcons").unwrap();

    let tasks: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            tokio::spawn(async move {
                let mut s = TcpStream::connect(addr).await.unwrap();
                for i in 0..LINES {
                    // interleave noise that must not count
                    let line = format!("{p}:{i}:0:0:0\n\nnoise\n");
                    s.write_all(line.as_bytes()).await.unwrap();
                }
                s.shutdown().await.unwrap();
            })
        })
        .collect();
    for t in tasks {
        t.await.unwrap();
    }

    let total = PRODUCERS * LINES;
    wait_until("all lines applied", || counter(&reg, &cuong("tmp_count")) == total).await;

    let accepted = MetricId::new("tallyline_connections_accepted_total", [("listener", "prodcons")]).unwrap();
    let failures = MetricId::new("tallyline_parse_failures_total", [("listener", "prodcons")]).unwrap();
    assert_eq!(counter(&reg, &accepted), PRODUCERS);
    wait_until("noise rejected", || counter(&reg, &failures) == total).await;
    assert_eq!(counter(&reg, &cuong("tmp_count")), total);

    gw.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrent_scrapes_during_ingestion() {
    let gw = Gateway::start(test_config()).await.unwrap();
    let addr = gw.listener_addr("prodcons").unwrap();

    let writer = tokio::spawn(async move {
        let mut s = TcpStream::connect(addr).await.unwrap();
        for i in 0..2000u32 {
            s.write_all(format!("{i}:{i}:{i}:{i}:{i}\n").as_bytes()).await.unwrap();
        }
    });

    let scrape_addr = gw.scrape_addr();
    let (a, b) = futures_util::future::join(
        http_get(scrape_addr, "/prometheus"),
        http_get(scrape_addr, "/prometheus"),
    )
    .await;

    for reply in [&a, &b] {
        assert_eq!(reply.status, 200);
        assert_eq!(
            reply.header("content-length").map(|v| v.parse::<usize>().unwrap()),
            Some(reply.body.len())
        );
        for line in reply.body.lines().filter(|l| !l.starts_with('#')) {
            let (_, value) = line.rsplit_once(' ').expect("sample line");
            value.parse::<f64>().unwrap_or_else(|_| panic!("bad value in {line:?}"));
        }
        assert!(reply.body.contains("# TYPE tmp_count counter"));
    }

    writer.await.unwrap();
    gw.shutdown().await.unwrap();
}

#[tokio::test]
async fn values_survive_producer_disconnect() {
    let gw = Gateway::start(test_config()).await.unwrap();
    let reg = gw.registry();
    let active = MetricId::new("tallyline_connections_active", [("listener", "prodcons")]).unwrap();

    let mut producer = TcpStream::connect(gw.listener_addr("prodcons").unwrap()).await.unwrap();
    producer.write_all(b"12:100:90:5:10\n").await.unwrap();
    wait_until("line applied", || counter(&reg, &cuong("tmp_count")) == 1).await;

    drop(producer);
    wait_until("connection closed", || {
        reg.value_of(&active) == Some(SampleValue::Gauge(0.0))
    })
    .await;

    let reply = http_get(gw.scrape_addr(), "/prometheus").await;
    assert!(reply.body.lines().any(|l| l == "cur_queue_size{name=\"cuong\"} 5"));
    assert!(reply.body.lines().any(|l| l == "tmp_count{name=\"cuong\"} 1"));

    gw.shutdown().await.unwrap();
}

#[tokio::test]
async fn echo_ack_listener_replies_per_line() {
    let gw = Gateway::start(test_config()).await.unwrap();
    let reg = gw.registry();

    let stream = TcpStream::connect(gw.listener_addr("acks").unwrap()).await.unwrap();
    let (rd, mut wr) = stream.into_split();
    let mut rd = BufReader::new(rd);

    wr.write_all(b"3:4:0.5\n").await.unwrap();
    let mut ack = String::new();
    rd.read_line(&mut ack).await.unwrap();
    assert_eq!(ack, "Server Message\n");

    wr.write_all(b"garbage\n").await.unwrap();
    ack.clear();
    rd.read_line(&mut ack).await.unwrap();
    assert_eq!(ack, "Server Message\n");

    let observer = |name: &str| MetricId::new(name, [("app", "observer")]).unwrap();
    assert_eq!(counter(&reg, &observer("ack_lines")), 1);
    assert_eq!(reg.value_of(&observer("cur_queue_size")), Some(SampleValue::Gauge(0.5)));

    gw.shutdown().await.unwrap();
}

#[tokio::test]
async fn bind_failure_aborts_startup() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let yaml = CONFIG.replacen("listen: \"127.0.0.1:0\"\n    labels: { name", &format!("listen: \"127.0.0.1:{port}\"\n    labels: {{ name"), 1);
    let cfg = config::load_from_str(&yaml).unwrap();
    assert_eq!(cfg.listeners[0].listen, format!("127.0.0.1:{port}"));

    let err = Gateway::start(cfg).await.err().expect("bind must fail");
    assert_eq!(err.kind(), ErrorKind::BindFailure);
}

#[tokio::test]
async fn registration_failure_precedes_any_bind() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let yaml = format!(
        r#"
version: 1
scrape: {{ listen: "127.0.0.1:0" }}
listeners:
  - {{ name: "a", listen: "127.0.0.1:{port}", counter: "tallyline_connections_active", fields: [ {{ gauge: "g" }} ] }}
"#
    );
    let cfg = config::load_from_str(&yaml).unwrap();

    let err = Gateway::start(cfg).await.err().expect("registration must fail");
    assert_eq!(err.kind(), ErrorKind::RegistrationFailure);
}

#[tokio::test]
async fn one_name_cannot_be_a_counter_and_a_gauge_across_listeners() {
    let yaml = r#"
version: 1
scrape: { listen: "127.0.0.1:0" }
listeners:
  - { name: "a", listen: "127.0.0.1:0", labels: { name: "cuong" }, counter: "lines", fields: [ { gauge: "g" } ] }
  - { name: "b", listen: "127.0.0.1:0", labels: { app: "observer" }, counter: "c", fields: [ { gauge: "lines" } ] }
"#;
    let cfg = config::load_from_str(yaml).unwrap();

    let err = Gateway::start(cfg).await.err().expect("registration must fail");
    assert_eq!(err.kind(), ErrorKind::RegistrationFailure);
    assert!(err.to_string().contains("lines"), "{err}");
}

#[tokio::test]
async fn summary_fields_and_connection_lines_are_scraped() {
    let yaml = r#"
version: 1
scrape: { listen: "127.0.0.1:0" }
listeners:
  - name: "dist"
    listen: "127.0.0.1:0"
    labels: { name: "cuong" }
    counter: "tmp_count"
    fields:
      - { gauge: "cur_queue_size" }
      - { summary: "wait_ms", kind: "decimal" }
"#;
    let gw = Gateway::start(config::load_from_str(yaml).unwrap()).await.unwrap();
    let reg = gw.registry();

    let mut producer = TcpStream::connect(gw.listener_addr("dist").unwrap()).await.unwrap();
    producer.write_all(b"5:1.5
6:2.5
7:x
").await.unwrap();
    wait_until("lines applied", || counter(&reg, &cuong("tmp_count")) == 2).await;
    assert_eq!(
        reg.value_of(&cuong("wait_ms")),
        Some(SampleValue::Summary { count: 2, sum: 4.0 })
    );

    drop(producer);
    let lines = MetricId::new("tallyline_connection_lines", [("listener", "dist")]).unwrap();
    wait_until("connection closed", || {
        matches!(reg.value_of(&lines), Some(SampleValue::Summary { count: 1, .. }))
    })
    .await;

    let reply = http_get(gw.scrape_addr(), "/prometheus").await;
    for line in [
        "# TYPE wait_ms summary",
        "wait_ms_count{name=\"cuong\"} 2",
        "wait_ms_sum{name=\"cuong\"} 4",
        "# TYPE tallyline_connection_lines summary",
        "tallyline_connection_lines_count{listener=\"dist\"} 1",
        "tallyline_connection_lines_sum{listener=\"dist\"} 2",
    ] {
        assert!(reply.body.lines().any(|l| l == line), "missing {line:?} in\n{}", reply.body);
    }
    assert_eq!(reply.body.matches("# TYPE wait_ms ").count(), 1);

    gw.shutdown().await.unwrap();
}

#[tokio::test]
async fn stopped_listener_refuses_new_producers_but_keeps_old_ones() {
    let cfg = test_config();
    let registry = Arc::new(MetricRegistry::new());
    let prepared = ingest::prepare(&cfg.listeners[..1], &registry).unwrap();
    let stats = Arc::clone(&prepared[0].stats);
    let mut handles = ingest::start(prepared).await.unwrap();
    let handle = handles.remove(0);
    let addr = handle.local_addr();

    let mut old = TcpStream::connect(addr).await.unwrap();
    wait_until("accepted", || stats.accepted.get() == 1).await;

    handle.shutdown().await;
    assert!(TcpStream::connect(addr).await.is_err());

    old.write_all(b"9:9:9:9:9\n").await.unwrap();
    wait_until("old producer still applied", || {
        counter(&registry, &cuong("tmp_count")) == 1
    })
    .await;
    assert_eq!(registry.value_of(&cuong("cur_prod_rate")), Some(SampleValue::Gauge(9.0)));
}

#[tokio::test]
async fn ops_endpoints_and_draining() {
    let gw = Gateway::start(test_config()).await.unwrap();
    let addr = gw.scrape_addr();

    let health = http_get(addr, "/healthz").await;
    assert_eq!((health.status, health.body.as_str()), (200, "ok"));

    let ready = http_get(addr, "/readyz").await;
    assert_eq!((ready.status, ready.body.as_str()), (200, "ready"));

    assert_eq!(http_get(addr, "/nope").await.status, 404);

    gw.state().set_draining();
    let ready = http_get(addr, "/readyz").await;
    assert_eq!((ready.status, ready.body.as_str()), (503, "draining"));

    gw.shutdown().await.unwrap();
}
