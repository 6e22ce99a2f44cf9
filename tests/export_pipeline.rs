//! End-to-end export tests against a real SQLite store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use report_exporter::{
    ExportError, ExportOptions, ExportRequest, Report, ReportExporter, ReportQuery, ReportStore,
    SqliteReportStore, ValidationError, CSV_HEADER,
};

#[path = "helpers.rs"]
mod helpers;

use helpers::{
    collect_csv, create_exporter, create_test_pool, fee_detail, insert_report, parse_csv, utc,
};

fn january(shop_id: i64) -> ExportRequest {
    ExportRequest::new(shop_id, utc(2023, 1, 1), utc(2023, 1, 31))
}

#[tokio::test]
async fn test_one_report_with_two_details() {
    let pool = create_test_pool().await;
    insert_report(
        &pool,
        42,
        9001,
        utc(2023, 1, 15),
        &[fee_detail(1, 100), fee_detail(2, 200)],
    )
    .await;
    // Other shop and out-of-window rows must not leak into the export
    insert_report(&pool, 7, 9002, utc(2023, 1, 15), &[fee_detail(3, 300)]).await;
    insert_report(&pool, 42, 9003, utc(2023, 3, 1), &[fee_detail(4, 400)]).await;

    let exporter = create_exporter(&pool, 32, 64 * 1024);
    let export = exporter
        .export(&january(42), &CancellationToken::new())
        .expect("request should be valid");
    assert_eq!(export.file_name, "42_20230101_20230131.csv");

    let text = collect_csv(export.stream).await.unwrap();
    let summary = export.handle.wait().await.unwrap();

    let (header, rows) = parse_csv(&text);
    assert_eq!(header, CSV_HEADER.to_vec());
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r[0] == "42" && r[2] == "9001"));
    assert_eq!(rows[0][5], "2023-01-15 00:00:00");
    assert_eq!(rows[0][12], "2.50");

    assert_eq!(summary.reports, 1);
    assert_eq!(summary.lines, 2);
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.bytes, text.len() as u64);
}

#[tokio::test]
async fn test_header_only_when_nothing_matches() {
    let pool = create_test_pool().await;
    insert_report(&pool, 42, 1, utc(2022, 6, 1), &[fee_detail(1, 1)]).await;

    let exporter = create_exporter(&pool, 4, 1024);
    let export = exporter
        .export(&january(42), &CancellationToken::new())
        .unwrap();
    let text = collect_csv(export.stream).await.unwrap();
    let summary = export.handle.wait().await.unwrap();

    assert_eq!(text, format!("{}\n", CSV_HEADER.join(",")));
    assert_eq!(summary.rows, 0);
    assert_eq!(summary.reports, 0);
}

#[tokio::test]
async fn test_line_count_equals_detail_sum() {
    let pool = create_test_pool().await;
    let mut expected = 0;
    for order in 0..40i64 {
        let details: Vec<_> = (0..order % 5)
            .map(|d| fee_detail(order * 10 + d, d))
            .collect();
        expected += details.len();
        insert_report(&pool, 42, order, utc(2023, 1, 2), &details).await;
    }

    let exporter = create_exporter(&pool, 8, 256);
    let export = exporter
        .export(&january(42), &CancellationToken::new())
        .unwrap();
    let text = collect_csv(export.stream).await.unwrap();
    let summary = export.handle.wait().await.unwrap();

    let (_, rows) = parse_csv(&text);
    assert_eq!(rows.len(), expected);
    assert_eq!(summary.lines as usize, expected);
    assert_eq!(summary.rows as usize, expected);
    assert_eq!(summary.reports, 40);
}

#[tokio::test]
async fn test_pool_size_does_not_change_output_multiset() {
    let pool = create_test_pool().await;
    for order in 0..25i64 {
        let details: Vec<_> = (0..3).map(|d| fee_detail(order * 100 + d, order + d)).collect();
        insert_report(&pool, 42, order, utc(2023, 1, 20), &details).await;
    }

    let mut outputs = Vec::new();
    for pool_size in [1, 32] {
        let exporter = create_exporter(&pool, pool_size, 64);
        let export = exporter
            .export(&january(42), &CancellationToken::new())
            .unwrap();
        let text = collect_csv(export.stream).await.unwrap();
        export.handle.wait().await.unwrap();

        let (_, rows) = parse_csv(&text);
        let mut keys: Vec<(String, String)> =
            rows.into_iter().map(|r| (r[6].clone(), r[7].clone())).collect();
        keys.sort();
        outputs.push(keys);
    }

    assert_eq!(outputs[0].len(), 75);
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_details_of_one_report_stay_in_order() {
    let pool = create_test_pool().await;
    for order in 0..10i64 {
        let details: Vec<_> = (0..4).map(|d| fee_detail(order * 10 + d, d)).collect();
        insert_report(&pool, 42, order, utc(2023, 1, 5), &details).await;
    }

    let exporter = create_exporter(&pool, 16, 1024);
    let export = exporter
        .export(&january(42), &CancellationToken::new())
        .unwrap();
    let text = collect_csv(export.stream).await.unwrap();
    export.handle.wait().await.unwrap();

    let (_, rows) = parse_csv(&text);
    for order in 0..10 {
        let ids: Vec<i64> = rows
            .iter()
            .filter(|r| r[2] == order.to_string())
            .map(|r| r[6].parse().unwrap())
            .collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted, "details of order {order} were reordered");
    }
}

#[tokio::test]
async fn test_window_bounds_are_inclusive() {
    let pool = create_test_pool().await;
    insert_report(&pool, 42, 1, utc(2023, 1, 1), &[fee_detail(1, 1)]).await;
    insert_report(&pool, 42, 2, utc(2023, 1, 31), &[fee_detail(2, 2)]).await;
    insert_report(
        &pool,
        42,
        3,
        utc(2023, 1, 31) + chrono::Duration::milliseconds(1),
        &[fee_detail(3, 3)],
    )
    .await;

    let exporter = create_exporter(&pool, 2, 1024);
    let export = exporter
        .export(&january(42), &CancellationToken::new())
        .unwrap();
    let text = collect_csv(export.stream).await.unwrap();
    export.handle.wait().await.unwrap();

    let (_, rows) = parse_csv(&text);
    let mut orders: Vec<&str> = rows.iter().map(|r| r[2].as_str()).collect();
    orders.sort_unstable();
    assert_eq!(orders, vec!["1", "2"]);
}

#[tokio::test]
async fn test_header_is_streamed_as_its_own_first_chunk() {
    let pool = create_test_pool().await;
    for order in 0..5i64 {
        insert_report(&pool, 42, order, utc(2023, 1, 3), &[fee_detail(order, order)]).await;
    }

    let exporter = create_exporter(&pool, 2, 1);
    let mut export = exporter
        .export(&january(42), &CancellationToken::new())
        .unwrap();

    let first = export.stream.next().await.unwrap().unwrap();
    assert_eq!(&first[..], format!("{}\n", CSV_HEADER.join(",")).as_bytes());

    let mut chunks = 1;
    while let Some(chunk) = export.stream.next().await {
        chunk.unwrap();
        chunks += 1;
    }
    export.handle.wait().await.unwrap();
    assert_eq!(chunks, 6, "one chunk per row plus the header");
}

/// Counts cursors opened by the wrapped store.
struct CountingStore {
    inner: SqliteReportStore,
    opened: Arc<AtomicUsize>,
}

impl ReportStore for CountingStore {
    fn query_reports<'a>(
        &'a self,
        query: &'a ReportQuery,
    ) -> BoxStream<'a, Result<Report, ExportError>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.inner.query_reports(query)
    }
}

#[tokio::test]
async fn test_invalid_requests_never_open_a_cursor() {
    let pool = create_test_pool().await;
    let opened = Arc::new(AtomicUsize::new(0));
    let exporter = ReportExporter::new(
        Arc::new(CountingStore {
            inner: SqliteReportStore::new(Arc::clone(&pool)),
            opened: Arc::clone(&opened),
        }),
        ExportOptions {
            max_window_days: 31,
            ..ExportOptions::default()
        },
    );
    let cancel = CancellationToken::new();

    let cases = [
        (
            ExportRequest::new(42, utc(2023, 2, 1), utc(2023, 1, 1)),
            ValidationError::StartAfterEnd,
        ),
        (
            ExportRequest::new(0, utc(2023, 1, 1), utc(2023, 1, 2)),
            ValidationError::MissingShopId,
        ),
        (
            ExportRequest {
                shop_id: 42,
                start_time: Some(utc(2023, 1, 1)),
                end_time: None,
            },
            ValidationError::MissingEndTime,
        ),
        (
            ExportRequest::new(42, utc(2023, 1, 1), utc(2023, 6, 1)),
            ValidationError::WindowTooLong { limit_days: 31 },
        ),
    ];
    for (request, expected) in cases {
        match exporter.export(&request, &cancel) {
            Err(ExportError::Validation(e)) => assert_eq!(e, expected),
            other => panic!("expected validation error, got {:?}", other.map(|r| r.file_name)),
        }
    }

    assert_eq!(opened.load(Ordering::SeqCst), 0);

    let export = exporter.export(&january(42), &cancel).unwrap();
    collect_csv(export.stream).await.unwrap();
    export.handle.wait().await.unwrap();
    assert_eq!(opened.load(Ordering::SeqCst), 1);
}
