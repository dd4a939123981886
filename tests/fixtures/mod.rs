#![allow(dead_code)]

use performance_issues::event::{Event, Span};

/// Create a db span with the given query as description
pub fn create_db_span(span_id: &str, start: f64, end: f64, query: &str) -> Span {
    Span::new(span_id, "db", start, end).with_description(query)
}

/// Create an outgoing http span with a structural hash
pub fn create_http_span(span_id: &str, start: f64, end: f64, url: &str, hash: &str) -> Span {
    Span::new(span_id, "http.client", start, end)
        .with_description(url)
        .with_hash(hash)
}

/// Create `count` identical db queries, one second apart, each lasting `duration` seconds
pub fn create_repeated_queries(count: usize, start: f64, duration: f64, query: &str) -> Vec<Span> {
    (0..count)
        .map(|i| {
            let span_start = start + i as f64;
            create_db_span(&format!("query{}", i), span_start, span_start + duration, query)
        })
        .collect()
}

/// Create a transaction with an N+1 database pattern: a view span, the
/// source query and `repeats` sequential queries of 100ms under the view
pub fn create_n_plus_one_db_event(repeats: usize) -> Event {
    let mut spans = vec![
        Span::new("view", "http.server", 10.0, 20.0)
            .with_hash("viewhash")
            .with_parent("root"),
        Span::new("source", "db", 10.0, 10.1)
            .with_description("SELECT * FROM authors")
            .with_hash("srchash")
            .with_parent("view"),
    ];
    spans.extend((0..repeats).map(|i| {
        let start = 10.2 + i as f64 * 0.2;
        Span::new(&format!("repeat{}", i), "db", start, start + 0.1)
            .with_description("SELECT * FROM books WHERE author_id = %s")
            .with_hash("nhash")
            .with_parent("view")
    }));
    Event::new("n_plus_one_db", 10.0, spans)
}

/// Create a page load transaction with an FCP measurement in milliseconds
pub fn create_page_load_event(fcp: f64, spans: Vec<Span>) -> Event {
    Event::new("page_load", 100.0, spans).with_measurement("fcp", fcp, Some("millisecond"))
}

/// Create a transaction mixing several problems, used for end to end checks
pub fn create_busy_event() -> Event {
    let mut spans = create_repeated_queries(5, 10.0, 0.11, "SELECT 1");
    spans.push(create_db_span("slow", 15.0, 16.5, "SELECT * FROM orders"));
    spans.extend((0..3).map(|i| {
        let start = 17.0 + i as f64 * 0.001;
        create_http_span(&format!("api{}", i), start, start + 0.2, "GET /api/items/1", "apihash")
    }));
    Event::new("busy", 10.0, spans)
}
