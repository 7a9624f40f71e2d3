//! Screener client: compiles queries, fetches the export, assembles records.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use super::config::ClientConfig;
use super::transport::{HttpTransport, Transport};
use crate::domain::{FilterSpec, StockRecord};
use crate::error::{Result, ScreenerError};
use crate::io::{Table, parse_table, project, records_from_table};
use crate::query::{QueryParameters, ScreenQuery, compile_fundamentals, compile_screen};

pub struct ScreenerClient<T: Transport = HttpTransport> {
    config: ClientConfig,
    transport: T,
    cancel: Option<Arc<AtomicBool>>,
}

impl ScreenerClient<HttpTransport> {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }
}

impl<T: Transport> ScreenerClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            cancel: None,
        }
    }

    /// Flag checked between per-ticker requests; once set, remaining tickers
    /// get placeholder records instead of requests.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Compiles a screen without sending it.
    pub fn compile(&self, spec: &FilterSpec) -> Result<ScreenQuery> {
        compile_screen(spec, self.config.auth_token(), self.config.encode_mode)
    }

    /// One export request. HTML and empty bodies yield `None`.
    fn fetch_table(&self, params: &QueryParameters) -> Result<Option<Table>> {
        let url = self.config.export_url();
        debug!(url = %url, params = ?params, "export request");

        let Some(text) = self.transport.get(&url, &params.to_pairs())?.into_text() else {
            return Ok(None);
        };
        let table = parse_table(&text)?;
        if !table.row_errors.is_empty() {
            warn!(skipped = table.row_errors.len(), "some rows could not be parsed");
        }
        Ok(Some(table))
    }

    /// Runs a screen and returns at most the spec's (clamped) result cap.
    pub fn screen(&self, spec: &FilterSpec) -> Result<Vec<StockRecord>> {
        let query = self.compile(spec)?;
        if let Some(recipe) = query.recipe {
            debug!(recipe = recipe.name(), "using fixed-order recipe");
        }

        let Some(mut table) = self.fetch_table(&query.params)? else {
            info!("screen returned no data");
            return Ok(Vec::new());
        };
        if let Some(cap) = query.result_cap() {
            table.truncate(cap);
        }

        let records = records_from_table(&table, None);
        info!(rows = records.len(), "screen complete");
        Ok(records)
    }

    /// Fetches one ticker. `None` when the provider has no row for it.
    pub fn stock(&self, ticker: &str, fields: Option<&[String]>) -> Result<Option<StockRecord>> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Ok(None);
        }
        let requested = [ticker];
        let params = compile_fundamentals(&requested, self.config.auth_token())?;

        let Some(table) = self.fetch_table(&params)? else {
            return Ok(None);
        };
        let record = records_from_table(&table, Some(requested.as_slice()))
            .into_iter()
            .next();
        Ok(record.map(|r| shape(r, fields)))
    }

    /// Fetches several tickers.
    ///
    /// Tries one bulk request first. Tickers it does not cover are fetched one
    /// at a time; anything that still fails becomes a placeholder record. The
    /// output always has one entry per input ticker, in input order. Only
    /// configuration errors are returned.
    pub fn stocks(&self, tickers: &[String], fields: Option<&[String]>) -> Result<Vec<StockRecord>> {
        let wanted: Vec<String> = tickers.iter().map(|t| normalize_ticker(t)).collect();
        let queryable: Vec<String> = wanted.iter().filter(|t| !t.is_empty()).cloned().collect();
        if queryable.is_empty() {
            return Ok(wanted.iter().map(|t| placeholder(t, fields)).collect());
        }

        let params = compile_fundamentals(&queryable, self.config.auth_token())?;
        let bulk = match self.fetch_table(&params) {
            Ok(Some(table)) if !table.is_empty() => records_from_table(&table, Some(queryable.as_slice())),
            Ok(_) => {
                info!(tickers = queryable.len(), "bulk fetch returned no rows; falling back to per-ticker requests");
                Vec::new()
            }
            Err(err @ ScreenerError::Config(_)) => return Err(err),
            Err(err) => {
                info!(error = %err, "bulk fetch failed; falling back to per-ticker requests");
                Vec::new()
            }
        };

        let mut out = Vec::with_capacity(wanted.len());
        for ticker in &wanted {
            if ticker.is_empty() {
                out.push(placeholder(ticker, fields));
                continue;
            }
            if let Some(found) = bulk.iter().find(|r| r.ticker().eq_ignore_ascii_case(ticker)) {
                out.push(shape(found.clone(), fields));
                continue;
            }
            if self.cancelled() {
                debug!(ticker = %ticker, "cancelled; using placeholder");
                out.push(placeholder(ticker, fields));
                continue;
            }
            match self.stock(ticker, fields) {
                Ok(Some(record)) => out.push(record),
                Ok(None) => {
                    warn!(ticker = %ticker, "no data for ticker");
                    out.push(placeholder(ticker, fields));
                }
                Err(err @ ScreenerError::Config(_)) => return Err(err),
                Err(err) => {
                    error!(ticker = %ticker, error = %err, "per-ticker fetch failed");
                    out.push(placeholder(ticker, fields));
                }
            }
        }

        let filled = out.iter().filter(|r| !r.is_empty()).count();
        info!(requested = wanted.len(), with_data = filled, "bulk fetch complete");
        Ok(out)
    }
}

fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase()
}

fn shape(record: StockRecord, fields: Option<&[String]>) -> StockRecord {
    match fields {
        Some(requested) if !requested.is_empty() => project(&record, requested),
        _ => record,
    }
}

fn placeholder(ticker: &str, fields: Option<&[String]>) -> StockRecord {
    match fields {
        Some(requested) if !requested.is_empty() => StockRecord::placeholder_with(ticker, requested),
        _ => StockRecord::placeholder(ticker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldValue, Threshold};
    use mockito::{Matcher, Server, ServerGuard};
    use std::time::Duration;

    const SCREEN_CSV: &str = "\
No.,Ticker,Company,Price,Change,Volume
1,AAPL,Apple Inc.,189.50,1.20%,\"51,234,100\"
2,MSFT,Microsoft Corporation,410.10,-0.40%,\"20,000,000\"
3,NVDA,NVIDIA Corporation,120.00,3.10%,\"300,000,000\"
";

    fn client(server: &ServerGuard) -> ScreenerClient {
        let config = ClientConfig::default()
            .with_base_url(server.url())
            .with_auth_token(Some("token".into()))
            .with_rate_limit(Duration::ZERO)
            .with_retry(1, Duration::ZERO);
        ScreenerClient::new(config).unwrap()
    }

    fn tickers(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn screen_sends_compiled_query_and_builds_records() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("v".into(), "151".into()),
                Matcher::UrlEncoded("f".into(), "sh_price_o10".into()),
                Matcher::UrlEncoded("o".into(), "-ticker".into()),
                Matcher::UrlEncoded("ft".into(), "4".into()),
                Matcher::UrlEncoded("auth".into(), "token".into()),
            ]))
            .with_body(SCREEN_CSV)
            .create();

        let spec = FilterSpec {
            price_min: Some(Threshold::Value(10.0)),
            ..FilterSpec::default()
        };
        let records = client(&server).screen(&spec).unwrap();

        mock.assert();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].ticker(), "AAPL");
        assert_eq!(records[2].price_change(), Some(3.1));
    }

    #[test]
    fn screen_enforces_result_cap_client_side() {
        let mut server = Server::new();
        server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::UrlEncoded("ar".into(), "2".into()))
            .with_body(SCREEN_CSV)
            .create();

        let spec = FilterSpec {
            max_results: Some(2),
            ..FilterSpec::default()
        };
        let records = client(&server).screen(&spec).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn html_answer_is_an_empty_screen() {
        let mut server = Server::new();
        server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::Any)
            .with_body("<!DOCTYPE html><html><body>Sign in</body></html>")
            .create();

        let records = client(&server).screen(&FilterSpec::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn missing_auth_fails_before_any_request() {
        let mut server = Server::new();
        let mock = server.mock("GET", Matcher::Any).expect(0).create();

        let config = ClientConfig::default()
            .with_base_url(server.url())
            .with_rate_limit(Duration::ZERO);
        let client = ScreenerClient::new(config).unwrap();

        let err = client.screen(&FilterSpec::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = client.stocks(&tickers(&["AAPL"]), None).unwrap_err();
        assert!(matches!(err, ScreenerError::Config(_)));
        mock.assert();
    }

    #[test]
    fn single_ticker_uses_fundamentals_view() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("v".into(), "152".into()),
                Matcher::UrlEncoded("t".into(), "AAPL".into()),
            ]))
            .with_body("Ticker,Price,P/E\nAAPL,189.50,29.10\n")
            .create();

        let fields = tickers(&["price", "pe"]);
        let record = client(&server)
            .stock(" aapl ", Some(fields.as_slice()))
            .unwrap()
            .unwrap();

        mock.assert();
        assert_eq!(record.ticker(), "AAPL");
        assert_eq!(record.number("price"), Some(189.5));
        assert_eq!(record.number("pe"), Some(29.1));
    }

    #[test]
    fn bulk_fetch_recovers_tickers_by_position() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::UrlEncoded("t".into(), "AAPL,MSFT".into()))
            .with_body("Price,Change\n189.50,1.20%\n410.10,-0.40%\n")
            .expect(1)
            .create();

        let records = client(&server)
            .stocks(&tickers(&["AAPL", "MSFT"]), None)
            .unwrap();

        mock.assert();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].ticker(), "MSFT");
        assert_eq!(records[1].price(), Some(410.1));
    }

    #[test]
    fn bulk_failure_falls_back_and_keeps_length_and_order() {
        let mut server = Server::new();
        server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::UrlEncoded("t".into(), "AAA,BBB,CCC".into()))
            .with_status(500)
            .create();
        let aaa = server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::UrlEncoded("t".into(), "AAA".into()))
            .with_body("Ticker,Price\nAAA,1.5\n")
            .expect(1)
            .create();
        server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::UrlEncoded("t".into(), "BBB".into()))
            .with_body("<html><body>nope</body></html>")
            .create();
        server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::UrlEncoded("t".into(), "CCC".into()))
            .with_status(404)
            .create();

        let fields = tickers(&["price"]);
        let records = client(&server)
            .stocks(&tickers(&["aaa", "BBB", "CCC"]), Some(fields.as_slice()))
            .unwrap();

        aaa.assert();
        let names: Vec<_> = records.iter().map(StockRecord::ticker).collect();
        assert_eq!(names, vec!["AAA", "BBB", "CCC"]);
        assert_eq!(records[0].number("price"), Some(1.5));
        assert_eq!(records[1].get("price"), Some(&FieldValue::Null));
        assert!(records[2].is_empty());
    }

    #[test]
    fn partial_bulk_result_fetches_only_the_missing_tickers() {
        let mut server = Server::new();
        server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::UrlEncoded("t".into(), "AAA,BBB".into()))
            .with_body("Ticker,Price\nBBB,2\n")
            .create();
        let aaa = server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::UrlEncoded("t".into(), "AAA".into()))
            .with_body("Ticker,Price\nAAA,1\n")
            .expect(1)
            .create();

        let records = client(&server)
            .stocks(&tickers(&["AAA", "BBB"]), None)
            .unwrap();

        aaa.assert();
        assert_eq!(records[0].price(), Some(1.0));
        assert_eq!(records[1].price(), Some(2.0));
    }

    #[test]
    fn cancellation_stops_the_fallback_loop() {
        let mut server = Server::new();
        server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::UrlEncoded("t".into(), "AAA,BBB".into()))
            .with_body("")
            .create();
        let single = server
            .mock("GET", "/export.ashx")
            .match_query(Matcher::Regex("t=(AAA|BBB)(&|$)".into()))
            .expect(0)
            .create();

        let flag = Arc::new(AtomicBool::new(true));
        let records = client(&server)
            .with_cancel_flag(flag)
            .stocks(&tickers(&["AAA", "BBB"]), None)
            .unwrap();

        single.assert();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(StockRecord::is_empty));
    }

    #[test]
    fn blank_tickers_keep_their_slot() {
        let server = Server::new();
        let records = client(&server)
            .stocks(&tickers(&["", "  "]), None)
            .unwrap();
        assert_eq!(records.len(), 2);
    }
}
