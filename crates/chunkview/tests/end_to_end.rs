//! Facade-level scenarios: a custom data source wired through the prelude.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chunkview::prelude::*;
use chunkview::{ChunkRequest, DataSourceError, DataSourceResult};

/// Synthetic log lines generated on demand.
struct LogLines {
    lines: usize,
    loads: AtomicUsize,
}

impl LogLines {
    fn new(lines: usize) -> Self {
        Self {
            lines,
            loads: AtomicUsize::new(0),
        }
    }
}

impl DataSource<String> for LogLines {
    fn name(&self) -> &str {
        "log-lines"
    }

    fn total(&self, query: &QueryParams) -> DataSourceResult<usize> {
        match query.filters.get("level").map(String::as_str) {
            None => Ok(self.lines),
            Some("error") => Ok(self.lines / 10),
            Some(other) => Err(DataSourceError::InvalidRequest(format!("level {other}"))),
        }
    }

    fn load_chunk(&self, request: &ChunkRequest) -> DataSourceResult<Vec<String>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let total = self.total(&request.query)?;
        let end = (request.start + request.count).min(total);
        Ok((request.start..end).map(|i| format!("line {i}")).collect())
    }
}

fn lines(engine: &ViewportEngine<String>) -> Vec<Option<String>> {
    engine
        .visible_items()
        .into_iter()
        .map(|row| row.item.cloned())
        .collect()
}

#[test]
fn driver_with_custom_source() -> Result<()> {
    let mut driver: Driver<String, LogLines> = Driver::new(
        ViewportConfig::new(5, 50),
        LogLines::new(1_000_000),
        DriverConfig::default(),
    )?;
    driver.wait_idle(Duration::from_secs(10))?;
    assert_eq!(lines(driver.engine())[0].as_deref(), Some("line 0"));

    driver.navigate(Navigation::JumpToEnd)?;
    driver.wait_idle(Duration::from_secs(10))?;
    assert_eq!(
        lines(driver.engine())[4].as_deref(),
        Some("line 999999")
    );
    // Only chunks around the window were ever fetched.
    assert!(driver.source().loads.load(Ordering::Relaxed) <= 6);
    Ok(())
}

#[test]
fn simulator_with_custom_source_and_query() {
    let mut sim: EngineSimulator<String, LogLines> = EngineSimulator::new(ViewportConfig::new(5, 50), LogLines::new(1_000));
    sim.init();
    sim.complete_all();
    assert_eq!(sim.engine().total_items(), 1_000);

    sim.set_query(QueryParams::new().filter("level", "error"));
    sim.complete_all();
    assert_eq!(sim.engine().total_items(), 100);

    sim.set_query(QueryParams::new().filter("level", "bogus"));
    sim.complete_all();
    let events = sim.take_events();
    assert!(events.iter().any(|event| matches!(
        event,
        EngineEvent::DataLoadError {
            chunk_start: None,
            error: DataSourceError::InvalidRequest(_)
        }
    )));
}

#[test]
fn read_only_source_refuses_selection() {
    let mut sim: EngineSimulator<String, LogLines> = EngineSimulator::new(ViewportConfig::new(5, 50), LogLines::new(100));
    sim.init();
    sim.complete_all();
    sim.clear_log();
    sim.select(&SelectionCommand::SelectAll);
    assert_eq!(sim.loads_issued(), 0);
    assert_eq!(sim.take_events().len(), 1);
}

#[test]
fn pure_engine_without_runtime() {
    let mut engine: ViewportEngine<String> = ViewportEngine::new(ViewportConfig::new(5, 10));
    let effects = engine.init();
    assert!(matches!(effects.as_slice(), [Effect::FetchTotal(_)]));

    let effects = engine.update(EngineMsg::TotalLoaded {
        query: QueryParams::new(),
        result: Ok(3),
    });
    let loads: Vec<_> = effects.iter().filter_map(Effect::as_load).collect();
    assert_eq!(loads.len(), 1);
    assert_eq!(engine.visible_items().len(), 3);
}
