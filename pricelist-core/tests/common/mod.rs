//! Shared helpers for pricelist-core integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use pricelist_core::fetch::{HttpResponse, HttpTransport};
use pricelist_core::Result;
use rust_xlsxwriter::Workbook;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

pub const WORKBOOK_URL: &str = "https://sheets.example.com/d/test/export?format=xlsx";

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A cell written by [`build_workbook`]
pub enum Cell {
    Text(&'static str),
    Number(f64),
    Empty,
}

impl From<&'static str> for Cell {
    fn from(s: &'static str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

/// Build an xlsx workbook; each sheet's first row is the banner
pub fn build_workbook(sheets: Vec<(&str, Vec<Vec<Cell>>)>) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name).unwrap();
        for (r, row) in rows.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match cell {
                    Cell::Text(s) => {
                        worksheet.write_string(r, c, s).unwrap();
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(r, c, n).unwrap();
                    }
                    Cell::Empty => {}
                }
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// The Cable/Pump/Notes workbook used across scenarios
pub fn sample_workbook() -> Vec<u8> {
    build_workbook(vec![
        (
            "Cable",
            vec![
                vec!["FEDUS MASTER PRICE LIST".into()],
                vec!["Title".into(), "ASIN".into(), "SKU".into()],
                vec!["Cat 6".into(), "A1".into(), 6.0.into()],
            ],
        ),
        (
            "Pump",
            vec![
                vec!["FEDUS MASTER PRICE LIST".into()],
                vec!["Title".into(), "ASIN".into(), "PRODUCT Gallery".into()],
                vec![
                    "Mini Pump".into(),
                    "B2".into(),
                    "https://drive.google.com/p".into(),
                ],
            ],
        ),
        (
            "Notes",
            vec![
                vec!["FEDUS MASTER PRICE LIST".into()],
                vec!["Title".into(), "ASIN".into()],
            ],
        ),
    ])
}

/// Transport that replays scripted responses, then serves a fallback body
pub struct MockTransport {
    script: Mutex<VecDeque<Result<HttpResponse>>>,
    fallback: Mutex<Vec<u8>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn serving(body: Vec<u8>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(body),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_script(mut self, script: Vec<Result<HttpResponse>>) -> Self {
        self.script = Mutex::new(script.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replace the body served once the script runs out
    pub fn set_body(&self, body: Vec<u8>) {
        *self.fallback.lock().unwrap() = body;
    }

    pub fn push(&self, outcome: Result<HttpResponse>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, _url: &str) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(outcome) => outcome,
            None => Ok(HttpResponse::ok(self.fallback.lock().unwrap().clone())),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
