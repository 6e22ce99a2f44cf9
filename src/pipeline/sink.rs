//! CSV encoding stage.
//!
//! Drains the line pipe in arrival order and writes one CSV row per line into
//! the output stream, in chunks of bounded size.

use bytes::Bytes;
use csv::Writer;
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::error_handling::{ExportError, Stage};
use crate::models::{ReportLine, REPORT_LINE_TIME_FORMAT};
use crate::pipeline::guard::guarded;
use crate::pipeline::output::OutputWriter;
use crate::pipeline::pipe::Pipe;

/// Fixed column order of every export.
pub const CSV_HEADER: [&str; 13] = [
    "Shop ID",
    "Fee ID",
    "Order ID",
    "Order Creation Time",
    "Order Payment Time",
    "Order Settlement Time",
    "Order Detail ID",
    "Product ID",
    "Category ID",
    "Product Price Amount",
    "Promo Amount",
    "Fee Base Amount",
    "Fee Final Amount",
];

/// What the sink wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkSummary {
    /// Data rows, header excluded.
    pub rows: u64,
    /// Bytes handed to the output stream, header included.
    pub bytes: u64,
}

/// Single consumer that serializes lines into CSV chunks.
#[derive(Debug, Clone, Copy)]
pub struct CsvSink {
    chunk_bytes: usize,
}

impl CsvSink {
    pub fn new(chunk_bytes: usize) -> Self {
        Self {
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    pub(crate) async fn run(
        &self,
        lines: Pipe<ReportLine>,
        output: OutputWriter,
        cancel: CancellationToken,
    ) -> Result<SinkSummary, ExportError> {
        guarded(Stage::Sink, self.encode(&lines, &output, &cancel)).await
    }

    async fn encode(
        &self,
        lines: &Pipe<ReportLine>,
        output: &OutputWriter,
        cancel: &CancellationToken,
    ) -> Result<SinkSummary, ExportError> {
        let mut writer = Writer::from_writer(Vec::with_capacity(self.chunk_bytes));
        let mut summary = SinkSummary::default();

        writer.write_record(CSV_HEADER)?;
        summary.bytes += self.emit(&mut writer, output, cancel).await?;

        while let Some(line) = lines.recv(cancel).await? {
            writer.write_record(format_line(&line))?;
            summary.rows += 1;

            writer.flush().map_err(|e| ExportError::Encoding(e.to_string()))?;
            if writer.get_ref().len() >= self.chunk_bytes {
                summary.bytes += self.emit(&mut writer, output, cancel).await?;
            }
        }

        summary.bytes += self.emit(&mut writer, output, cancel).await?;
        debug!(
            "Sink finished: {} rows, {} bytes",
            summary.rows, summary.bytes
        );
        Ok(summary)
    }

    /// Hands everything buffered so far to the output stream.
    async fn emit(
        &self,
        writer: &mut Writer<Vec<u8>>,
        output: &OutputWriter,
        cancel: &CancellationToken,
    ) -> Result<u64, ExportError> {
        writer.flush().map_err(|e| ExportError::Encoding(e.to_string()))?;
        if writer.get_ref().is_empty() {
            return Ok(0);
        }
        let full = std::mem::replace(
            writer,
            Writer::from_writer(Vec::with_capacity(self.chunk_bytes)),
        );
        let chunk = full
            .into_inner()
            .map_err(|e| ExportError::Encoding(e.to_string()))?;
        let len = chunk.len() as u64;
        output.write(cancel, Bytes::from(chunk)).await?;
        Ok(len)
    }
}

fn format_line(line: &ReportLine) -> [String; 13] {
    let detail = &line.detail;
    [
        line.shop_id.to_string(),
        line.fee_id.to_string(),
        line.order_id.to_string(),
        line.order_creation_time.format(REPORT_LINE_TIME_FORMAT).to_string(),
        line.order_payment_time.format(REPORT_LINE_TIME_FORMAT).to_string(),
        line.order_settlement_time.format(REPORT_LINE_TIME_FORMAT).to_string(),
        detail.order_detail_id.to_string(),
        detail.product_id.to_string(),
        detail.category_id.to_string(),
        format_amount(detail.product_price_amount),
        format_amount(detail.promo_amount),
        format_amount(detail.fee_base_amount),
        format_amount(detail.fee_final_amount),
    ]
}

fn format_amount(amount: f64) -> String {
    format!("{:.2}", amount)
}
