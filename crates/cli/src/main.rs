//! `zar` — archive maintenance CLI (spec §4.2 on-disk archive layout).
//!
//! A thin wrapper over `zq-archive`/`zq-storage`: every subcommand
//! resolves `--root` through a [`SourceRegistry`], opens (or creates)
//! the archive there, performs one operation, and exits. There is no
//! shell or REPL mode — unlike a query tool, archive maintenance is a
//! one-shot operation per invocation.

mod commands;

use std::process;

use clap::ArgMatches;
use zq_archive::{Archive, ArchiveOpenOptions, SpanInfo};
use zq_core::{ChunkId, Error, Result, Span};
use zq_storage::{SourceRegistry, Source, Uri};

use commands::build_cli;

fn main() {
    tracing_subscriber::fmt::init();

    let matches = build_cli().get_matches();
    let root = matches.get_one::<String>("root").map(String::as_str).unwrap_or(".");
    let registry = SourceRegistry::with_defaults();

    let result = match matches.subcommand() {
        Some(("import", sub)) => run_import(&registry, root, sub),
        Some(("ls", sub)) => run_ls(&registry, root, sub),
        Some(("find", sub)) => run_find(&registry, root, sub),
        Some(("rm", sub)) => run_rm(&registry, root, sub),
        Some(("rmdirs", _)) => run_rmdirs(&registry, root),
        Some(("stat", _)) => run_stat(&registry, root),
        _ => unreachable!("build_cli requires a subcommand"),
    };

    if let Err(err) = result {
        eprintln!("zar: {err}");
        process::exit(1);
    }
}

fn run_import(registry: &SourceRegistry, root: &str, sub: &ArgMatches) -> Result<()> {
    let uri = Uri::parse(root);
    let source = registry.resolve(&uri)?;
    let mut archive = Archive::create_or_open(source.clone(), uri, ArchiveOpenOptions::default())?;

    for path in sub.get_many::<String>("paths").expect("required") {
        let source_uri = Uri::parse(path);
        let bytes = zq_storage::read_all(source.as_ref(), &source_uri)?;
        let span = span_of(&bytes);

        let chunk_id = ChunkId::generate();
        let chunk_uri = archive.localize(&chunk_id);
        zq_storage::write_all(source.as_ref(), &chunk_uri, &bytes)?;
        archive.append(vec![SpanInfo {
            span: span.unwrap_or(Span::new(0, 0)),
            chunk_id: chunk_id.clone(),
        }])?;

        println!("{}\t{} bytes", chunk_id.as_str(), bytes.len());
    }
    Ok(())
}

/// The union span of every `ts` field found across NDJSON `bytes`, or
/// `None` if no line carries one. Mirrors `zq-service`'s
/// `ingest::span_of`, which does the same walk over already-decoded
/// records rather than raw lines since the HTTP path has those in hand
/// for other reasons; this tool never needs a full decode just to find
/// a chunk's span.
fn span_of(bytes: &[u8]) -> Option<Span> {
    std::str::from_utf8(bytes)
        .ok()?
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .filter_map(|v| v.get("ts").and_then(|ts| ts.as_i64()))
        .map(|ts| Span::new(ts, 1))
        .reduce(|a, b| a.union(&b))
}

fn run_ls(registry: &SourceRegistry, root: &str, sub: &ArgMatches) -> Result<()> {
    let uri = Uri::parse(root);
    let source = registry.resolve(&uri)?;
    let archive = Archive::open(source, uri, None)?;
    let as_json = sub.get_flag("json");

    for info in archive.spans() {
        if as_json {
            println!(
                "{}",
                serde_json::json!({
                    "chunk_id": info.chunk_id.as_str(),
                    "ts": info.span.ts,
                    "dur": info.span.dur,
                })
            );
        } else {
            println!("{}\t{}\t{}", info.chunk_id.as_str(), info.span.ts, info.span.dur);
        }
    }
    Ok(())
}

fn run_find(registry: &SourceRegistry, root: &str, sub: &ArgMatches) -> Result<()> {
    let uri = Uri::parse(root);
    let source = registry.resolve(&uri)?;
    let archive = Archive::open(source, uri, None)?;

    let span = Span::new(parse_i64(sub, "ts")?, parse_i64(sub, "dur")?);
    for (_, info) in archive.span_walk(span) {
        println!("{}\t{}\t{}", info.chunk_id.as_str(), info.span.ts, info.span.dur);
    }
    Ok(())
}

fn run_rm(registry: &SourceRegistry, root: &str, sub: &ArgMatches) -> Result<()> {
    let uri = Uri::parse(root);
    let source = registry.resolve(&uri)?;
    let mut archive = Archive::open(source, uri, None)?;

    let ids: Vec<ChunkId> = sub
        .get_many::<String>("chunks")
        .expect("required")
        .map(|s| ChunkId::new(s.clone()))
        .collect();
    archive.remove_chunks(&ids)?;
    println!("removed {} chunk(s)", ids.len());
    Ok(())
}

fn run_stat(registry: &SourceRegistry, root: &str) -> Result<()> {
    let uri = Uri::parse(root);
    let source = registry.resolve(&uri)?;
    let archive = Archive::open(source, uri, None)?;

    let span = archive
        .spans()
        .iter()
        .fold(None, |acc: Option<Span>, s| {
            Some(match acc {
                Some(existing) => existing.union(&s.span),
                None => s.span,
            })
        });

    println!(
        "{}",
        serde_json::json!({
            "chunks": archive.spans().len(),
            "direction": format!("{:?}", archive.direction()),
            "span": span.map(|s| serde_json::json!({"ts": s.ts, "dur": s.dur})),
        })
    );
    Ok(())
}

fn run_rmdirs(registry: &SourceRegistry, root: &str) -> Result<()> {
    let uri = Uri::parse(root);
    let source = registry.resolve(&uri)?;
    let archive = Archive::open(source, uri, None)?;
    archive.remove_all_chunks()?;
    println!("removed archive at {root}");
    Ok(())
}

fn parse_i64(sub: &ArgMatches, name: &str) -> Result<i64> {
    sub.get_one::<String>(name)
        .expect("required")
        .parse::<i64>()
        .map_err(|_| Error::invalid(format!("{name} must be an integer")))
}
