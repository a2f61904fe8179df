//! Shared helpers for the integration suite.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabula::backend::{Column, ColumnarSource, ParserBackend};
use tabula::notes::SidecarNotes;
use tabula::resolver::{ConnectAttempt, MarkerDetector, Resolver, StoreKind};
use tabula::{Backend, Config, ConnectionRegistry, ConnectionService, Error, Params, Result, Value};
use tempfile::TempDir;

pub const FIXTURE_PARSER: &str = "fixture parser";

/// In-memory table data standing in for a legacy file.
struct PlayersSource;

impl ColumnarSource for PlayersSource {
    fn read_table(&mut self, table: &str) -> Result<Vec<Column>> {
        if !table.eq_ignore_ascii_case("players") {
            return Err(Error::query(format!("table '{table}' not found")));
        }
        Ok(vec![
            Column::new("Id", vec![Value::Integer(1), Value::Integer(2)]),
            Column::new(
                "Name",
                vec![Value::Text("Zola".into()), Value::Text("Vialli".into())],
            ),
        ])
    }
}

/// Opens every Access path with [`PlayersSource`].
struct FixtureParserAttempt;

impl ConnectAttempt for FixtureParserAttempt {
    fn label(&self) -> &str {
        FIXTURE_PARSER
    }

    fn applies_to(&self, kind: StoreKind) -> bool {
        kind.is_access()
    }

    fn open(&self, _path: &Path) -> Result<Backend> {
        Ok(Backend::Parser(ParserBackend::new(FIXTURE_PARSER, PlayersSource)))
    }
}

/// Service with default configuration.
pub fn service() -> ConnectionService {
    ConnectionService::new(&Config::default())
}

/// Service whose Access chain is a single parser attempt over fixed data.
pub fn parser_service() -> ConnectionService {
    ConnectionService::with_parts(
        Arc::new(ConnectionRegistry::new()),
        Resolver::new(
            vec![Box::new(FixtureParserAttempt)],
            Box::new(MarkerDetector::new(["previous version"])),
        ),
        Arc::new(SidecarNotes::new("AInotes")),
        PathBuf::from("empty.mdb"),
    )
}

pub fn db_path(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_str().unwrap().to_string()
}

pub fn params(pairs: &[(&str, Value)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}
